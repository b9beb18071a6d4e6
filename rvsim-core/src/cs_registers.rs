//! Control and Status Registers.
//!
//! Part of the "Zicsr" extension.

use crate::core::counters::{Counter, Counters};
use crate::{PrivilegeLevel, RawPrivilegeLevel};
use std::collections::BTreeMap;
use thiserror::Error;

pub use specifier::CsrSpecifier;

/// Whether a CSR may be written.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Storage {
    Value(u32),
    /// Read-only view of one half of a hardware counter.
    Counter(Counter),
}

/// A single mapped CSR: its address, name, access policy, privilege gate and current value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CsrEntry {
    specifier: CsrSpecifier,
    name: String,
    access: Access,
    privilege: RawPrivilegeLevel,
    write_mask: u32,
    reset_value: u32,
    storage: Storage,
}

impl CsrEntry {
    /// Creates a plain read/write-able CSR holding `reset_value`.
    ///
    /// Access policy and minimum privilege level follow the address convention (see
    /// [`specifier::is_read_only`] and [`specifier::required_privilege_level`]). Both can be
    /// overridden afterwards.
    ///
    /// Only the low 12 bits of `specifier` are used.
    pub fn new(specifier: CsrSpecifier, name: impl Into<String>, reset_value: u32) -> Self {
        let specifier = specifier & 0xFFF;
        Self {
            specifier,
            name: name.into(),
            access: if specifier::is_read_only(specifier) {
                Access::ReadOnly
            } else {
                Access::ReadWrite
            },
            privilege: specifier::required_privilege_level(specifier),
            write_mask: u32::MAX,
            reset_value,
            storage: Storage::Value(reset_value),
        }
    }

    fn counter(specifier: CsrSpecifier, name: &str, counter: Counter) -> Self {
        Self {
            access: Access::ReadOnly,
            storage: Storage::Counter(counter),
            ..Self::new(specifier, name, 0)
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_privilege(mut self, privilege: RawPrivilegeLevel) -> Self {
        self.privilege = privilege;
        self
    }

    /// Restrict which bits instructions can change. Bits outside `write_mask` keep their value.
    pub fn with_write_mask(mut self, write_mask: u32) -> Self {
        self.write_mask = write_mask;
        self
    }

    pub fn specifier(&self) -> CsrSpecifier {
        self.specifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Minimum privilege level needed to access this CSR.
    pub fn privilege(&self) -> RawPrivilegeLevel {
        self.privilege
    }

    pub fn write_mask(&self) -> u32 {
        self.write_mask
    }

    fn value(&self, counters: &Counters) -> u32 {
        match self.storage {
            Storage::Value(value) => value,
            Storage::Counter(counter) => counters.read(counter),
        }
    }
}

/// The CSR address space of a single hart: a mapping from 12-bit specifier to [`CsrEntry`].
///
/// > RISC-V defines a separate address space of 4096 Control and Status registers associated with
/// > each hart.
///
/// > The standard RISC-V ISA sets aside a 12-bit encoding space (csr\[11:0]) for up to 4,096 CSRs.
/// > By convention, the upper 4 bits of the CSR address (csr\[11:8]) are used to encode the read
/// > and write accessibility of the CSRs according to privilege level as shown in Table 2.1. The
/// > top two bits (csr\[11:10]) indicate whether the register is read/write (00, 01, or 10) or
/// > read-only (11). The next two bits (csr\[9:8]) encode the lowest privilege level that can
/// > access the CSR.
///
/// Reads and writes through [`read`](Self::read), [`write`](Self::write) and the atomic
/// read-modify-write operations are checked against each entry's access policy and privilege gate.
/// All checks happen before anything is committed, so a failed access never changes state.
#[derive(Debug, Clone)]
pub struct CsrFile {
    entries: BTreeMap<CsrSpecifier, CsrEntry>,
    counters: Counters,
}

impl Default for CsrFile {
    fn default() -> Self {
        Self::user_level()
    }
}

impl CsrFile {
    /// Creates a CSR file without any mapped registers.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            counters: Counters::new(),
        }
    }

    /// Creates a CSR file with the user-level trap setup/handling registers and the unprivileged
    /// counters.
    pub fn user_level() -> Self {
        use specifier::*;

        let mut csrs = Self::new();
        let entries = [
            CsrEntry::new(USTATUS, "ustatus", 0).with_write_mask(USTATUS_MASK),
            CsrEntry::new(UIE, "uie", 0).with_write_mask(UI_MASK),
            CsrEntry::new(UTVEC, "utvec", 0),
            CsrEntry::new(USCRATCH, "uscratch", 0),
            CsrEntry::new(UEPC, "uepc", 0).with_write_mask(!0b11),
            CsrEntry::new(UCAUSE, "ucause", 0),
            CsrEntry::new(UTVAL, "utval", 0),
            CsrEntry::new(UIP, "uip", 0).with_write_mask(UI_MASK),
            CsrEntry::counter(CYCLE, "cycle", Counter::Cycle),
            CsrEntry::counter(TIME, "time", Counter::Time),
            CsrEntry::counter(INSTRET, "instret", Counter::Instret),
            CsrEntry::counter(CYCLEH, "cycleh", Counter::CycleH),
            CsrEntry::counter(TIMEH, "timeh", Counter::TimeH),
            CsrEntry::counter(INSTRETH, "instreth", Counter::InstretH),
        ];
        for entry in entries {
            csrs.insert(entry);
        }
        csrs
    }

    /// Maps `entry` at its specifier, returning the entry it replaces.
    pub fn insert(&mut self, entry: CsrEntry) -> Option<CsrEntry> {
        self.entries.insert(entry.specifier, entry)
    }

    pub fn remove(&mut self, specifier: CsrSpecifier) -> Option<CsrEntry> {
        self.entries.remove(&specifier)
    }

    pub fn entry(&self, specifier: CsrSpecifier) -> Option<&CsrEntry> {
        self.entries.get(&specifier)
    }

    /// Look up the specifier of a CSR by name.
    pub fn specifier_of(&self, name: &str) -> Option<CsrSpecifier> {
        self.entries
            .values()
            .find(|entry| entry.name == name)
            .map(|entry| entry.specifier)
    }

    /// Iterate over all mapped CSRs in address order.
    pub fn iter(&self) -> impl Iterator<Item = &CsrEntry> {
        self.entries.values()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    /// Force all registers and counters to their reset values.
    pub fn reset(&mut self) {
        self.counters = Counters::new();
        for entry in self.entries.values_mut() {
            if let Storage::Value(value) = &mut entry.storage {
                *value = entry.reset_value;
            }
        }
    }

    /// Returns the current value of a CSR without any access checks, or `None` if it is unmapped.
    pub fn get(&self, specifier: CsrSpecifier) -> Option<u32> {
        self.entries
            .get(&specifier)
            .map(|entry| entry.value(&self.counters))
    }

    /// Returns `true` if the CSR is mapped to a plain value, which [`set`](Self::set) can replace.
    pub fn is_settable(&self, specifier: CsrSpecifier) -> bool {
        matches!(
            self.entries.get(&specifier),
            Some(CsrEntry {
                storage: Storage::Value(_),
                ..
            })
        )
    }

    /// Replaces the value of a CSR, bypassing its access policy, privilege gate and write mask.
    ///
    /// Counters cannot be set this way.
    pub fn set(&mut self, specifier: CsrSpecifier, value: u32) -> Result<(), CsrError> {
        let entry = self
            .entries
            .get_mut(&specifier)
            .ok_or(CsrError::Unavailable(specifier))?;
        match &mut entry.storage {
            Storage::Value(stored) => {
                *stored = value;
                Ok(())
            }
            Storage::Counter(_) => Err(CsrError::ReadOnly(specifier)),
        }
    }

    /// Read the value of a CSR by its specifier.
    ///
    /// `privilege_level` indicates at what privilege level the read is performed. If the CSR that
    /// is being read requires a higher privilege level, then a [`CsrError::Privileged`] is given.
    pub fn read(
        &self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
    ) -> Result<u32, CsrError> {
        let entry = self.check_access(specifier, privilege_level)?;
        Ok(entry.value(&self.counters))
    }

    /// Write `value` to a CSR. Bits outside the entry's write mask are preserved.
    pub fn write(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        value: u32,
    ) -> Result<(), CsrError> {
        self.modify(specifier, privilege_level, |_| value).map(|_| ())
    }

    /// Atomically replace the value of a CSR, returning the value it held before.
    pub fn swap(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        value: u32,
    ) -> Result<u32, CsrError> {
        self.modify(specifier, privilege_level, |_| value)
    }

    /// Atomically set the bits of `mask` in a CSR, returning the value it held before.
    pub fn set_bits(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        mask: u32,
    ) -> Result<u32, CsrError> {
        self.modify(specifier, privilege_level, |old| old | mask)
    }

    /// Atomically clear the bits of `mask` in a CSR, returning the value it held before.
    pub fn clear_bits(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        mask: u32,
    ) -> Result<u32, CsrError> {
        self.modify(specifier, privilege_level, |old| old & !mask)
    }

    // The old value is captured and the new one committed under a single mutable borrow, so no
    // other access can observe the CSR in between.
    fn modify<F>(
        &mut self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
        update: F,
    ) -> Result<u32, CsrError>
    where
        F: FnOnce(u32) -> u32,
    {
        self.check_access(specifier, privilege_level)?;
        let entry = self
            .entries
            .get_mut(&specifier)
            .ok_or(CsrError::Unavailable(specifier))?;
        let write_mask = entry.write_mask;
        match (&mut entry.storage, entry.access) {
            (Storage::Value(stored), Access::ReadWrite) => {
                let old = *stored;
                *stored = old & !write_mask | update(old) & write_mask;
                Ok(old)
            }
            _ => Err(CsrError::ReadOnly(specifier)),
        }
    }

    fn check_access(
        &self,
        specifier: CsrSpecifier,
        privilege_level: PrivilegeLevel,
    ) -> Result<&CsrEntry, CsrError> {
        if !specifier::is_valid(specifier) {
            return Err(CsrError::Unavailable(specifier));
        }
        let entry = self
            .entries
            .get(&specifier)
            .ok_or(CsrError::Unavailable(specifier))?;
        if privilege_level < entry.privilege {
            return Err(CsrError::Privileged {
                specifier,
                required_level: entry.privilege,
                actual_level: privilege_level,
            });
        }
        Ok(entry)
    }
}

/// Errors that can occur when attempting to access a CSR.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CsrError {
    /// No CSR is mapped at the specifier.
    #[error("attempt to access unavailable CSR {0:#05x}")]
    Unavailable(CsrSpecifier),
    /// Attempt to access a CSR that requires a higher privilege level.
    #[error(
        "cannot access CSR {specifier:#05x} from privilege level {actual_level}, \
             since it requires privilege level {required_level}"
    )]
    Privileged {
        /// The CSR for which access was requested.
        specifier: CsrSpecifier,
        /// The minimum required privilege level to access that CSR.
        required_level: RawPrivilegeLevel,
        /// The actual privilege level from which the access was performed.
        actual_level: PrivilegeLevel,
    },
    #[error("attempt to write read-only CSR {0:#05x}")]
    ReadOnly(CsrSpecifier),
}

pub mod specifier {
    //! Specifiers of the CSRs mapped by default, and the address conventions of the CSR space.

    use crate::RawPrivilegeLevel;

    /// General CSR specifier. Note that this can hold any value, even if the value doesn't fit in
    /// 12 bits or represents an unmapped CSR.
    pub type CsrSpecifier = u16;

    //
    // User trap setup (`0x000..=0x005`).
    //
    /// User status register.
    pub const USTATUS: CsrSpecifier = 0x000;
    /// User interrupt-enable register.
    pub const UIE: CsrSpecifier = 0x004;
    /// User trap handler base address.
    pub const UTVEC: CsrSpecifier = 0x005;

    //
    // User trap handling (`0x040..=0x044`).
    //
    /// Scratch register for user trap handlers.
    pub const USCRATCH: CsrSpecifier = 0x040;
    /// User exception program counter.
    pub const UEPC: CsrSpecifier = 0x041;
    /// User trap cause.
    pub const UCAUSE: CsrSpecifier = 0x042;
    /// User bad address or instruction.
    pub const UTVAL: CsrSpecifier = 0x043;
    /// User interrupt pending.
    pub const UIP: CsrSpecifier = 0x044;

    //
    // Unprivileged counters/timers (`0xC00..=0xC02`, `0xC80..=0xC82`).
    //
    /// Cycle counter for RDCYCLE instruction.
    pub const CYCLE: CsrSpecifier = 0xC00;
    /// Timer for RDTIME instruction.
    pub const TIME: CsrSpecifier = 0xC01;
    /// Instructions-retired counter for RDINSTRET instruction.
    pub const INSTRET: CsrSpecifier = 0xC02;
    /// Upper 32 bits of [`CYCLE`], RV32 only.
    pub const CYCLEH: CsrSpecifier = 0xC80;
    /// Upper 32 bits of [`TIME`], RV32 only.
    pub const TIMEH: CsrSpecifier = 0xC81;
    /// Upper 32 bits of [`INSTRET`], RV32 only.
    pub const INSTRETH: CsrSpecifier = 0xC82;

    /// `ustatus.UIE`: user interrupts enabled.
    pub const USTATUS_UIE: usize = 0;
    /// `ustatus.UPIE`: user interrupts enabled before the last trap.
    pub const USTATUS_UPIE: usize = 4;
    pub(crate) const USTATUS_MASK: u32 = 1 << USTATUS_UIE | 1 << USTATUS_UPIE;
    // USIE, UTIE and UEIE
    pub(crate) const UI_MASK: u32 = 0x111;

    /// Returns `true` if `specifier` is valid, which is the case if it fits in 12 bits.
    pub fn is_valid(specifier: CsrSpecifier) -> bool {
        specifier < 1 << 12
    }

    /// Returns `true` if this CSR only supports read access.
    ///
    /// Requires [`is_valid(specifier)`](is_valid), otherwise the return value is undefined.
    pub fn is_read_only(specifier: CsrSpecifier) -> bool {
        // The top two bits of a CSR specifier indicate whether the CSR is read-only (0b11) or
        // read/write (0b00, 0b01, 0b10)
        (specifier >> 10) & 0b11 == 0b11
    }

    /// Returns the minimum required privilege level to access this CSR.
    ///
    /// Requires [`is_valid(specifier)`](is_valid), otherwise the return value is undefined.
    ///
    /// Note that this returns a [`RawPrivilegeLevel`], meaning the minimum required privilege level
    /// may be a reserved level. This still has a defined meaning: only higher privilege levels are
    /// allowed to access the CSR.
    pub fn required_privilege_level(specifier: CsrSpecifier) -> RawPrivilegeLevel {
        // Bits `9:8` indicate the minimum required privilege level
        RawPrivilegeLevel::from_u2(((specifier >> 8) & 0b11) as u8)
    }
}
