use crate::{AddressRange, Alignment};
use std::collections::HashMap;
use thiserror::Error;

macro_rules! access_fns {
    ( $( $read_fn:ident, $write_fn:ident => $u:ident ),* $(,)? ) => {
        $(
            /// Invoke a little-endian read for the specified address.
            ///
            /// The address doesn't need to be naturally aligned, but unless misaligned accesses
            /// are supported, [`MemoryError::MisalignedAccess`] is returned for such attempts.
            pub fn $read_fn(&self, address: u32) -> Result<$u, MemoryError> {
                let mut buf = [0u8; std::mem::size_of::<$u>()];
                self.read(&mut buf, address).map(|()| $u::from_le_bytes(buf))
            }

            /// Invoke a little-endian write for the specified address.
            ///
            /// The address doesn't need to be naturally aligned, but unless misaligned accesses
            /// are supported, [`MemoryError::MisalignedAccess`] is returned for such attempts.
            pub fn $write_fn(&mut self, address: u32, value: $u) -> Result<(), MemoryError> {
                self.write(address, &value.to_le_bytes())
            }
        )*
    };
}

pub const PAGE_SIZE: usize = 4096;
const PAGE_SHIFT: u32 = PAGE_SIZE.trailing_zeros();

/// Layout of the simulated address space.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryConfig {
    /// Addresses instructions can be fetched from.
    pub text: AddressRange,
    /// Addresses readable and writable by loads and stores.
    pub data: AddressRange,
    /// Start of the static data laid out by the assembler.
    pub data_base: u32,
    /// Initial program break, as handed out by the `sbrk` service.
    pub heap_base: u32,
    /// Initial value of `gp`.
    pub global_pointer: u32,
    /// Initial value of `sp`.
    pub stack_pointer: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            text: AddressRange::new_const(0x0040_0000, 0x0FFF_FFFF),
            data: AddressRange::new_const(0x1000_0000, 0x7FFF_FFFF),
            data_base: 0x1001_0000,
            heap_base: 0x1004_0000,
            global_pointer: 0x1000_8000,
            stack_pointer: 0x7FFF_EFFC,
        }
    }
}

impl MemoryConfig {
    /// Layout for a linked image: `text` holds the executable segments and every other address is
    /// data.
    pub fn with_text(text: AddressRange) -> Self {
        Self {
            text,
            data: AddressRange::full(),
            ..Self::default()
        }
    }
}

/// Byte-addressable, little-endian memory of the simulated hart.
///
/// Storage is allocated lazily in pages of [`PAGE_SIZE`] bytes, so the full 32-bit address space
/// can be mapped without cost. Bytes that have never been written read as zero.
///
/// Every access is checked against the configured layout: only the text region can be fetched
/// from, and it can only be written when self-modifying code is enabled. Accesses outside both
/// regions are access faults.
#[derive(Debug, Clone)]
pub struct Memory {
    text: AddressRange,
    data: AddressRange,
    writable_text: bool,
    support_misaligned_access: bool,
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
}

impl Memory {
    pub fn new(config: &MemoryConfig, writable_text: bool, support_misaligned_access: bool) -> Self {
        Self {
            text: config.text,
            data: config.data,
            writable_text,
            support_misaligned_access,
            pages: HashMap::new(),
        }
    }

    pub fn text(&self) -> AddressRange {
        self.text
    }

    pub fn data(&self) -> AddressRange {
        self.data
    }

    /// Fetch the instruction word at `address`, which must be word-aligned and inside the text
    /// region.
    pub fn fetch(&self, address: u32) -> Result<u32, MemoryError> {
        if !Alignment::WORD.is_aligned(address) {
            return Err(MemoryError::MisalignedAccess);
        }
        if !self.text.contains_span(address, 4) {
            return Err(MemoryError::AccessFault);
        }
        let mut buf = [0; 4];
        self.copy_out(&mut buf, address);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read(&self, buf: &mut [u8], address: u32) -> Result<(), MemoryError> {
        self.access(address, buf.len(), false)?;
        self.copy_out(buf, address);
        Ok(())
    }

    pub fn write(&mut self, address: u32, buf: &[u8]) -> Result<(), MemoryError> {
        self.access(address, buf.len(), true)?;
        self.copy_in(address, buf);
        Ok(())
    }

    pub fn read_byte(&self, address: u32) -> Result<u8, MemoryError> {
        let mut buf = [0];
        self.read(&mut buf, address).map(|()| buf[0])
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        self.write(address, &[value])
    }

    /// Returns the first of the `size` bytes starting at `address` that falls outside both
    /// regions, or `None` if every byte can be read. Addresses wrap around the address space.
    pub fn first_unmapped(&self, address: u32, size: u32) -> Option<u32> {
        let mut current = address;
        let mut remaining = u64::from(size);
        while remaining > 0 {
            let Some(region) = [self.text, self.data]
                .into_iter()
                .find(|region| region.contains(current))
            else {
                return Some(current);
            };
            let covered = u64::from(region.end() - current) + 1;
            if covered >= remaining {
                return None;
            }
            remaining -= covered;
            current = region.end().wrapping_add(1);
        }
        None
    }

    access_fns! {
        read_halfword, write_halfword => u16,
        read_word, write_word => u32,
    }

    /// Store `bytes` at `address` the way a program loader does: without alignment checks and
    /// regardless of whether the text region is writable. The bytes must still fall within a
    /// mapped region.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let size = u32::try_from(bytes.len()).map_err(|_| MemoryError::AccessFault)?;
        if !self.text.contains_span(address, size) && !self.data.contains_span(address, size) {
            return Err(MemoryError::AccessFault);
        }
        self.copy_in(address, bytes);
        Ok(())
    }

    /// Performs the necessary checks for an access at `address` of `size` bytes.
    fn access(&self, address: u32, size: usize, write: bool) -> Result<(), MemoryError> {
        let size = u32::try_from(size).map_err(|_| MemoryError::AccessFault)?;

        if !self.support_misaligned_access
            && !Alignment::natural_for_size(size)
                .map(|alignment| alignment.is_aligned(address))
                // If `size` is not a power of two, then the access is always considered unaligned
                .unwrap_or(false)
        {
            return Err(MemoryError::MisalignedAccess);
        }

        let last = address
            .checked_add(size.saturating_sub(1))
            .ok_or(MemoryError::AccessFault)?;
        let touches_text = self.text.contains(address) || self.text.contains(last);
        if write && touches_text && !self.writable_text {
            return Err(MemoryError::TextWrite);
        }
        if self.text.contains_span(address, size) || self.data.contains_span(address, size) {
            Ok(())
        } else {
            Err(MemoryError::AccessFault)
        }
    }

    fn copy_out(&self, buf: &mut [u8], address: u32) {
        for (offset, byte) in buf.iter_mut().enumerate() {
            let address = address.wrapping_add(offset as u32);
            *byte = self
                .pages
                .get(&(address >> PAGE_SHIFT))
                .map_or(0, |page| page[address as usize & (PAGE_SIZE - 1)]);
        }
    }

    fn copy_in(&mut self, address: u32, buf: &[u8]) {
        for (offset, &byte) in buf.iter().enumerate() {
            let address = address.wrapping_add(offset as u32);
            let page = self
                .pages
                .entry(address >> PAGE_SHIFT)
                .or_insert_with(|| Box::new([0; PAGE_SIZE]));
            page[address as usize & (PAGE_SIZE - 1)] = byte;
        }
    }
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemoryError {
    #[error("misaligned access")]
    MisalignedAccess,
    #[error("address out of range")]
    AccessFault,
    #[error("cannot write directly to the text segment")]
    TextWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(writable_text: bool, misaligned: bool) -> Memory {
        Memory::new(&MemoryConfig::default(), writable_text, misaligned)
    }

    #[test]
    fn test_read_write() {
        let mut memory = memory(false, false);
        assert_eq!(Ok(0), memory.read_word(0x1001_0000));
        memory.write_word(0x1001_0000, 0x1234_5678).unwrap();
        assert_eq!(Ok(0x78), memory.read_byte(0x1001_0000));
        assert_eq!(Ok(0x1234), memory.read_halfword(0x1001_0002));
        memory.write_byte(0x1001_0003, 0xAB).unwrap();
        assert_eq!(Ok(0xAB34_5678), memory.read_word(0x1001_0000));
    }

    #[test]
    fn test_page_boundary() {
        let mut memory = memory(false, true);
        memory.write_word(0x1001_0FFE, 0xDEAD_BEEF).unwrap();
        assert_eq!(Ok(0xBEEF), memory.read_halfword(0x1001_0FFE));
        assert_eq!(Ok(0xDEAD), memory.read_halfword(0x1001_1000));
    }

    #[test]
    fn test_misaligned() {
        let mut memory = memory(false, false);
        assert_eq!(
            Err(MemoryError::MisalignedAccess),
            memory.read_word(0x1001_0002)
        );
        assert_eq!(
            Err(MemoryError::MisalignedAccess),
            memory.write_halfword(0x1001_0001, 1)
        );
        assert_eq!(Ok(0), memory.read_byte(0x1001_0001));
        let mut memory = self::memory(false, true);
        assert_eq!(Ok(()), memory.write_word(0x1001_0002, 5));
        assert_eq!(Ok(5), memory.read_word(0x1001_0002));
    }

    #[test]
    fn test_regions() {
        let mut memory = memory(false, false);
        assert_eq!(Err(MemoryError::AccessFault), memory.read_word(0));
        assert_eq!(Err(MemoryError::AccessFault), memory.write_word(0x8000_0000, 1));
        assert_eq!(Err(MemoryError::AccessFault), memory.fetch(0x1001_0000));
        assert_eq!(Err(MemoryError::MisalignedAccess), memory.fetch(0x0040_0002));
        assert_eq!(
            Err(MemoryError::TextWrite),
            memory.write_word(0x0040_0000, 0x13)
        );
        memory.load(0x0040_0000, &0x13u32.to_le_bytes()).unwrap();
        assert_eq!(Ok(0x13), memory.fetch(0x0040_0000));
        assert_eq!(Ok(0x13), memory.read_word(0x0040_0000));
        assert_eq!(Err(MemoryError::AccessFault), memory.load(0, &[1]));
    }

    #[test]
    fn test_first_unmapped() {
        let memory = memory(false, false);
        assert_eq!(None, memory.first_unmapped(0x1001_0000, 0x100));
        assert_eq!(None, memory.first_unmapped(0x0FFF_FFFE, 4));
        assert_eq!(Some(0x8000_0000), memory.first_unmapped(0x1001_0000, 0x7000_0000));
        assert_eq!(Some(0x10), memory.first_unmapped(0x10, 1));
        assert_eq!(None, memory.first_unmapped(0x10, 0));
        let memory = Memory::new(&MemoryConfig::with_text(AddressRange::full()), false, false);
        assert_eq!(None, memory.first_unmapped(0xFFFF_FFF0, u32::MAX));
    }

    #[test]
    fn test_writable_text() {
        let mut memory = memory(true, false);
        memory.write_word(0x0040_0004, 0x0000_0073).unwrap();
        assert_eq!(Ok(0x73), memory.fetch(0x0040_0004));
    }

    #[test]
    fn test_linked_layout() {
        let text = AddressRange::new_const(0x8000_0000, 0x8000_0FFF);
        let mut memory = Memory::new(&MemoryConfig::with_text(text), false, false);
        assert_eq!(Ok(()), memory.write_word(0x10, 1));
        assert_eq!(Ok(()), memory.write_word(0x8000_1000, 1));
        assert_eq!(Err(MemoryError::TextWrite), memory.write_byte(0x8000_0FFF, 1));
        assert_eq!(Err(MemoryError::AccessFault), memory.fetch(0x8000_1000));
    }
}
