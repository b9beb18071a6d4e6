use super::Exception;
use crate::cs_registers::specifier::{UCAUSE, UEPC, USTATUS, USTATUS_UIE, USTATUS_UPIE, UTVAL, UTVEC};
use crate::cs_registers::{CsrError, CsrFile};
use crate::program::ProgramStatement;
use crate::registers::Registers;
use bitvec::order::Lsb0;
use bitvec::view::BitView;
use log::{debug, warn};
use thiserror::Error;

/// A synchronous exception raised while executing an instruction.
///
/// Besides the kind of exception, a trap carries the value that is made available to a trap
/// handler through `utval` (a faulting address, or the offending instruction word), and a
/// diagnostic message for humans. Traps caused by a CSR access also keep the [`CsrError`], so
/// callers can tell an unavailable CSR from a privilege violation without parsing the message.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{message}")]
pub struct Trap {
    exception: Exception,
    value: u32,
    message: String,
    csr_error: Option<CsrError>,
}

impl Trap {
    pub fn new(exception: Exception, value: u32, message: impl Into<String>) -> Self {
        Self {
            exception,
            value,
            message: message.into(),
            csr_error: None,
        }
    }

    /// A failed CSR access: always an illegal instruction.
    pub fn csr(raw: u32, error: CsrError) -> Self {
        Self {
            csr_error: Some(error.clone()),
            ..Self::illegal_instruction(raw, error.to_string())
        }
    }

    /// Shorthand for an [`Exception::IllegalInstruction`], reporting the offending instruction.
    pub fn illegal_instruction(raw: u32, message: impl Into<String>) -> Self {
        Self::new(Exception::IllegalInstruction, raw, message)
    }

    pub fn exception(&self) -> Exception {
        self.exception
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn csr_error(&self) -> Option<&CsrError> {
        self.csr_error.as_ref()
    }
}

/// A [`Trap`] that was not handled, tagged with the statement that raised it.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("runtime exception at {statement}: {trap} ({})", .trap.exception)]
pub struct Fault {
    statement: ProgramStatement,
    #[source]
    trap: Trap,
}

impl Fault {
    pub fn new(statement: ProgramStatement, trap: Trap) -> Self {
        Self { statement, trap }
    }

    pub fn statement(&self) -> &ProgramStatement {
        &self.statement
    }

    pub fn trap(&self) -> &Trap {
        &self.trap
    }

    /// The kind of exception that occurred.
    pub fn exception(&self) -> Exception {
        self.trap.exception
    }

    pub fn message(&self) -> &str {
        &self.trap.message
    }
}

/// Transfers control to the user trap handler, if one is installed.
///
/// A handler is installed when the base address in `utvec` is non-zero. On entry, `uepc` holds the
/// address of the faulting statement, `ucause` the exception code and `utval` the trap value.
/// `ustatus.UPIE` takes the old value of `ustatus.UIE`, which is then cleared.
///
/// Returns `false`, without touching any state, if there is no handler, or if any of the CSRs the
/// handler protocol writes is missing.
pub(super) fn enter_handler(csrs: &mut CsrFile, registers: &mut Registers, fault: &Fault) -> bool {
    let base = csrs.get(UTVEC).unwrap_or(0) & !0b11;
    if base == 0 {
        return false;
    }
    if let Some(missing) = [USTATUS, UEPC, UCAUSE, UTVAL]
        .into_iter()
        .find(|&specifier| !csrs.is_settable(specifier))
    {
        warn!(csr = missing; "user trap handler installed, but a trap register is missing");
        return false;
    }
    let epc = fault.statement.address();
    debug!(
        exception:% = fault.exception(),
        epc = epc,
        handler = base;
        "entering user trap handler"
    );

    let mut status = csrs.get(USTATUS).unwrap_or(0);
    let bits = status.view_bits_mut::<Lsb0>();
    let enabled = bits[USTATUS_UIE];
    bits.set(USTATUS_UPIE, enabled);
    bits.set(USTATUS_UIE, false);

    let committed = csrs
        .set(USTATUS, status)
        .and_then(|()| csrs.set(UEPC, epc))
        .and_then(|()| csrs.set(UCAUSE, fault.exception().code()))
        .and_then(|()| csrs.set(UTVAL, fault.trap.value));
    if let Err(err) = committed {
        warn!("failed to enter user trap handler: {err}");
        return false;
    }
    *registers.pc_mut() = base;
    true
}

/// Returns from a user trap handler: restores `ustatus.UIE` from `ustatus.UPIE` and resumes at
/// `uepc`.
pub(super) fn return_from_handler(
    csrs: &mut CsrFile,
    registers: &mut Registers,
    raw: u32,
) -> Result<(), Trap> {
    let (Some(mut status), Some(epc)) = (csrs.get(USTATUS), csrs.get(UEPC)) else {
        return Err(Trap::illegal_instruction(raw, "uret without user trap registers"));
    };
    let bits = status.view_bits_mut::<Lsb0>();
    let previous = bits[USTATUS_UPIE];
    bits.set(USTATUS_UIE, previous);
    bits.set(USTATUS_UPIE, true);
    let _ = csrs.set(USTATUS, status);
    *registers.pc_mut() = epc;
    Ok(())
}
