//! "Zicsr" extension for control and status register instructions.

use super::InstructionDef;
use crate::core::{CsrOp, CsrSource, ExecutionResult, Executor};
use crate::format::{Format, Operands};

pub(super) const INSTRUCTIONS: &[InstructionDef] = &[
    InstructionDef::new(
        "csrrw",
        Format::Csr,
        "ssssssssssss ttttt 001 fffff 1110011",
        "csrrw t0, uscratch, t1",
        "Atomic read/write CSR: read from the CSR into t0 and write t1 to the CSR",
        csrrw,
    ),
    InstructionDef::new(
        "csrrs",
        Format::Csr,
        "ssssssssssss ttttt 010 fffff 1110011",
        "csrrs t0, uscratch, t1",
        "Atomic read/set CSR: read from the CSR into t0 and logical or t1 into the CSR",
        csrrs,
    ),
    InstructionDef::new(
        "csrrc",
        Format::Csr,
        "ssssssssssss ttttt 011 fffff 1110011",
        "csrrc t0, uscratch, t1",
        "Atomic read/clear CSR: read from the CSR into t0 and clear bits of the CSR according to \
         t1",
        csrrc,
    ),
    InstructionDef::new(
        "csrrwi",
        Format::CsrImm,
        "ssssssssssss ttttt 101 fffff 1110011",
        "csrrwi t0, uscratch, 10",
        "Atomic read/write CSR immediate: read from the CSR into t0 and write a constant to the CSR",
        csrrwi,
    ),
    InstructionDef::new(
        "csrrsi",
        Format::CsrImm,
        "ssssssssssss ttttt 110 fffff 1110011",
        "csrrsi t0, uscratch, 10",
        "Atomic read/set CSR immediate: read from the CSR into t0 and logical or a constant into \
         the CSR",
        csrrsi,
    ),
    InstructionDef::new(
        "csrrci",
        Format::CsrImm,
        "ssssssssssss ttttt 111 fffff 1110011",
        "csrrci t0, uscratch, 10",
        "Atomic read/clear CSR immediate: read from the CSR into t0 and clear bits of the CSR \
         according to a constant",
        csrrci,
    ),
];

/// > The CSRRW (Atomic Read/Write CSR) instruction atomically swaps values in the CSRs and integer
/// > registers. CSRRW reads the old value of the CSR, zero-extends the value to XLEN bits, then
/// > writes it to integer register rd. The initial value in rs1 is written to the CSR.
fn csrrw(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Register, CsrOp::ReadWrite)
}

/// > The CSRRS (Atomic Read and Set Bits in CSR) instruction reads the value of the CSR,
/// > zero-extends the value to XLEN bits, and writes it to integer register rd. The initial value
/// > in integer register rs1 is treated as a bit mask that specifies bit positions to be set in
/// > the CSR.
fn csrrs(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Register, CsrOp::ReadSet)
}

fn csrrc(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Register, CsrOp::ReadClear)
}

fn csrrwi(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Immediate, CsrOp::ReadWrite)
}

fn csrrsi(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Immediate, CsrOp::ReadSet)
}

fn csrrci(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.csr_op(operands, CsrSource::Immediate, CsrOp::ReadClear)
}

#[cfg(test)]
mod tests {
    use crate::core::{Config, Core, Exception, Outcome};
    use crate::cs_registers::specifier::{UIE, USCRATCH};
    use crate::cs_registers::{CsrEntry, CsrError};
    use crate::instruction::InstructionSet;
    use crate::program::ProgramStatement;
    use crate::registers::Specifier;
    use crate::{PrivilegeLevel, RawPrivilegeLevel};
    use std::sync::Arc;

    const PC: u32 = 0x0040_0000;
    const CUSTOM: i32 = 10;

    fn core() -> (Arc<InstructionSet>, Core) {
        let set = Arc::new(InstructionSet::standard());
        let mut core = Core::new(Arc::clone(&set), Config::default());
        core.csrs_mut().insert(CsrEntry::new(CUSTOM as u16, "custom", 0));
        (set, core)
    }

    fn run(set: &InstructionSet, core: &mut Core, mnemonic: &str, operands: &[i32]) {
        let raw = set.encode(mnemonic, operands).unwrap();
        let outcome = core.execute(&ProgramStatement::new(PC, raw));
        assert_eq!(Ok(Outcome::Continue), outcome, "{mnemonic} {operands:?}");
    }

    fn t0(core: &Core) -> u32 {
        core.registers().x(Specifier::T0)
    }

    #[test]
    fn test_read_write() {
        let (set, mut core) = core();
        core.registers_mut().set_x(Specifier::from_u5(6), 0xFF);
        run(&set, &mut core, "csrrw", &[5, CUSTOM, 6]);
        assert_eq!(0, t0(&core));
        assert_eq!(Some(0xFF), core.csrs().get(CUSTOM as u16));
        run(&set, &mut core, "csrrwi", &[5, CUSTOM, 31]);
        assert_eq!(0xFF, t0(&core));
        assert_eq!(Some(31), core.csrs().get(CUSTOM as u16));
        assert_eq!(PC + 4, core.registers().pc());
    }

    #[test]
    fn test_set_and_clear() {
        let (set, mut core) = core();
        core.registers_mut().set_x(Specifier::from_u5(6), 0xF0);
        run(&set, &mut core, "csrrs", &[5, CUSTOM, 6]);
        run(&set, &mut core, "csrrsi", &[5, CUSTOM, 0x0F]);
        assert_eq!(0xF0, t0(&core));
        assert_eq!(Some(0xFF), core.csrs().get(CUSTOM as u16));
        run(&set, &mut core, "csrrc", &[5, CUSTOM, 6]);
        run(&set, &mut core, "csrrci", &[5, CUSTOM, 0x03]);
        assert_eq!(0x0F, t0(&core));
        assert_eq!(Some(0x0C), core.csrs().get(CUSTOM as u16));
    }

    #[test]
    fn test_write_mask() {
        let (set, mut core) = core();
        run(&set, &mut core, "csrrwi", &[0, UIE as i32, 31]);
        assert_eq!(Some(0x11), core.csrs().get(UIE));
        core.registers_mut().set_x(Specifier::from_u5(6), u32::MAX);
        run(&set, &mut core, "csrrw", &[5, USCRATCH as i32, 6]);
        assert_eq!(Some(u32::MAX), core.csrs().get(USCRATCH));
    }

    #[test]
    fn test_counters_read_only() {
        let (set, mut core) = core();
        let cycle = crate::cs_registers::specifier::CYCLE as i32;
        run(&set, &mut core, "csrrsi", &[5, cycle, 0]);
        run(&set, &mut core, "csrrc", &[5, cycle, 0]);

        let raw = set.encode("csrrwi", &[5, cycle, 0]).unwrap();
        let fault = core
            .execute(&ProgramStatement::new(PC, raw))
            .unwrap_err();
        assert_eq!(Exception::IllegalInstruction, fault.exception());
        assert_eq!(raw, fault.trap().value());
        assert!(matches!(fault.trap().csr_error(), Some(CsrError::ReadOnly(_))));
    }

    #[test]
    fn test_privileged() {
        let (set, mut core) = core();
        core.csrs_mut().insert(CsrEntry::new(0x340, "mscratch", 0));
        let raw = set.encode("csrrs", &[5, 0x340, 0]).unwrap();
        let fault = core
            .execute(&ProgramStatement::new(PC, raw))
            .unwrap_err();
        assert!(matches!(
            fault.trap().csr_error(),
            Some(CsrError::Privileged {
                required_level: RawPrivilegeLevel::Machine,
                actual_level: PrivilegeLevel::User,
                ..
            })
        ));
    }
}
