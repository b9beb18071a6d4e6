//! Loading linked programs from 32-bit RISC-V ELF files.

use crate::address_range::InvalidBoundsError;
use crate::core::memory::MemoryConfig;
use crate::program::{ProgramImage, ProgramStatement};
use crate::AddressRange;
use goblin::elf::header::EM_RISCV;
use goblin::elf::program_header::{ProgramHeader, PF_X, PT_LOAD};
use log::debug;
use thiserror::Error;

pub use goblin::elf::Elf;

/// Magic bytes at the start of every ELF file.
pub const MAGIC: &[u8] = b"\x7fELF";

#[derive(Error, Debug)]
pub enum ElfError {
    #[error("malformed ELF file: {0}")]
    Parse(#[from] goblin::error::Error),
    #[error("not a 32-bit RISC-V ELF file")]
    UnsupportedMachine,
    #[error("segment at {address:#x} extends past the end of the file")]
    Truncated { address: u64 },
    #[error("segment at {address:#x} of {size:#x} bytes does not fit in the address space")]
    OutOfRange { address: u64, size: u64 },
    #[error("segment at {address:#x} holds more bytes in the file than in memory")]
    SizeMismatch { address: u64 },
    #[error("no executable segment")]
    NoText,
    #[error(transparent)]
    Bounds(#[from] InvalidBoundsError),
}

/// Parses `buf` and builds a program image from it, see [`load_parsed`].
pub fn load(buf: &[u8]) -> Result<(ProgramImage, MemoryConfig), ElfError> {
    let elf = Elf::parse(buf)?;
    load_parsed(&elf, buf)
}

/// Builds a program image from the loadable segments of an already parsed ELF file.
///
/// Executable segments become text statements, one per word, and the text region of the returned
/// memory layout spans exactly those segments. All other segments are copied into data memory.
/// The zero-filled tail of a segment (`.bss`) is not copied, since fresh memory reads as zero.
pub fn load_parsed(elf: &Elf, buf: &[u8]) -> Result<(ProgramImage, MemoryConfig), ElfError> {
    if elf.is_64 || elf.header.e_machine != EM_RISCV {
        return Err(ElfError::UnsupportedMachine);
    }

    let mut image = ProgramImage::new().with_entry(elf.entry as u32);
    let mut text: Option<(u32, u32)> = None;
    for header in elf.program_headers.iter().filter(|h| h.p_type == PT_LOAD) {
        let (address, last) = segment_span(header)?;
        let bytes = buf
            .get(header.file_range())
            .ok_or(ElfError::Truncated {
                address: header.p_vaddr,
            })?;
        debug!("loading segment into memory at [{address:#010x}..={last:#010x}]");

        if header.p_flags & PF_X != 0 {
            // Every chunk lies within `address..=last`, which was checked to fit
            for (index, chunk) in bytes.chunks(4).enumerate() {
                let mut word = [0; 4];
                word[..chunk.len()].copy_from_slice(chunk);
                image.push_statement(ProgramStatement::new(
                    address + 4 * index as u32,
                    u32::from_le_bytes(word),
                ));
            }
            text = Some(match text {
                Some((start, end)) => (start.min(address), end.max(last)),
                None => (address, last),
            });
        } else if !bytes.is_empty() {
            image.push_data(address, bytes);
        }
    }

    let (start, end) = text.ok_or(ElfError::NoText)?;
    let text = AddressRange::new(start, end)?;
    Ok((image, MemoryConfig::with_text(text)))
}

/// Returns the first and last address a segment occupies in memory.
fn segment_span(header: &ProgramHeader) -> Result<(u32, u32), ElfError> {
    let address = header.p_vaddr;
    if header.p_memsz < header.p_filesz {
        return Err(ElfError::SizeMismatch { address });
    }
    let size = header.p_memsz;
    let last = address.checked_add(size.max(1) - 1);
    match (
        u32::try_from(address).ok(),
        last.and_then(|last| u32::try_from(last).ok()),
    ) {
        (Some(address), Some(last)) => Ok((address, last)),
        _ => Err(ElfError::OutOfRange { address, size }),
    }
}

/// Returns the value of the symbol called `name`, if the file has one.
pub fn symbol(elf: &Elf, name: &str) -> Option<u32> {
    elf.syms
        .iter()
        .find(|sym| elf.strtab.get_at(sym.st_name) == Some(name))
        .map(|sym| sym.st_value as u32)
}
