use super::memory::{Memory, MemoryError};
use super::trap::{self, Trap};
use super::{Exception, ExecutionResult, Outcome};
use crate::cs_registers::{CsrFile, CsrSpecifier};
use crate::environment::Environment;
use crate::format::Operands;
use crate::registers::{Registers, Specifier};
use crate::{Alignment, PrivilegeLevel};

/// Where the source operand of a CSR instruction comes from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrSource {
    /// The value of register `rs1`.
    Register,
    /// The zero-extended 5-bit immediate in the `rs1` field.
    Immediate,
}

/// The read-modify-write operation performed by a CSR instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrOp {
    ReadWrite,
    ReadSet,
    ReadClear,
}

/// Mutable view of the hart state handed to instruction semantics.
///
/// The helpers on this type implement the shape shared by a group of instructions (e.g. all
/// register-immediate operations), reading their operands in assembly order. They check everything
/// that can fail before writing any register, and only update the `pc` once all other effects
/// happened.
#[derive(Debug)]
pub struct Executor<'a> {
    pub(super) raw: u32,
    pub(super) privilege_level: PrivilegeLevel,
    pub(super) registers: &'a mut Registers,
    pub(super) csrs: &'a mut CsrFile,
    pub(super) memory: &'a mut Memory,
    pub(super) environment: &'a mut Environment,
}

impl Executor<'_> {
    /// The encoding of the statement being executed.
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        self.privilege_level
    }

    pub fn registers(&self) -> &Registers {
        &*self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut *self.registers
    }

    pub fn csrs(&self) -> &CsrFile {
        &*self.csrs
    }

    pub fn memory(&self) -> &Memory {
        &*self.memory
    }

    /// Proceed to the next statement without any other effect.
    pub fn next(&mut self) -> ExecutionResult {
        self.registers.increment_pc();
        Ok(Outcome::Continue)
    }

    /// Operands `rd, rs1, imm`.
    pub fn reg_imm_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(u32, i32) -> u32,
    {
        let (dest, src, immediate) = (
            operands.register(0),
            operands.register(1),
            operands.immediate(2),
        );
        let value = op(self.registers.x(src), immediate);
        self.registers.set_x(dest, value);
        self.next()
    }

    /// Operands `rd, rs1, shamt`.
    pub fn reg_shamt_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(u32, u32) -> u32,
    {
        let (dest, src) = (operands.register(0), operands.register(1));
        let shift_amount_u5 = operands.unsigned(2) & 0x1F;
        let value = op(self.registers.x(src), shift_amount_u5);
        self.registers.set_x(dest, value);
        self.next()
    }

    /// Operands `rd, rs1, rs2`.
    pub fn reg_reg_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(u32, u32) -> u32,
    {
        let (dest, src1, src2) = (
            operands.register(0),
            operands.register(1),
            operands.register(2),
        );
        let value = op(self.registers.x(src1), self.registers.x(src2));
        self.registers.set_x(dest, value);
        self.next()
    }

    /// Operands `rd, imm`, where `op` receives the `pc` and the immediate shifted into the upper 20
    /// bits.
    pub fn upper_imm_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(u32, u32) -> u32,
    {
        let dest = operands.register(0);
        let upper = operands.unsigned(1) << 12;
        let value = op(self.registers.pc(), upper);
        self.registers.set_x(dest, value);
        self.next()
    }

    /// Jumps to the target computed by `compute_target`, linking the return address into `dest`.
    pub fn jump_op<F>(&mut self, dest: Specifier, compute_target: F) -> ExecutionResult
    where
        F: FnOnce(&Registers) -> u32,
    {
        // Compute target pc
        let new_pc = compute_target(&*self.registers);
        // Check target pc is word-aligned
        if !Alignment::WORD.is_aligned(new_pc) {
            return Err(misaligned_target(new_pc));
        }
        // Update pc to target
        let old_pc = std::mem::replace(self.registers.pc_mut(), new_pc);
        // Write incremented old pc to `dest` register
        self.registers.set_x(dest, old_pc.wrapping_add(4));
        Ok(Outcome::Continue)
    }

    /// Operands `rs1, rs2, offset`. Takes the branch if `predicate` returns `true`.
    pub fn cond_branch<P>(&mut self, operands: &Operands, predicate: P) -> ExecutionResult
    where
        P: FnOnce(u32, u32) -> bool,
    {
        let (src1, src2, offset) = (
            operands.register(0),
            operands.register(1),
            operands.immediate(2),
        );
        if predicate(self.registers.x(src1), self.registers.x(src2)) {
            let new_pc = self.registers.pc().wrapping_add_signed(offset);
            // Check target pc is word-aligned
            if !Alignment::WORD.is_aligned(new_pc) {
                return Err(misaligned_target(new_pc));
            }
            *self.registers.pc_mut() = new_pc;
            Ok(Outcome::Continue)
        } else {
            self.next()
        }
    }

    /// Operands `rd, offset(rs1)`.
    pub fn load_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(&Memory, u32) -> Result<u32, MemoryError>,
    {
        let (dest, offset, base) = (
            operands.register(0),
            operands.immediate(1),
            operands.register(2),
        );
        let address = self.registers.x(base).wrapping_add_signed(offset);
        let value = op(&*self.memory, address).map_err(|err| {
            let exception = match err {
                MemoryError::MisalignedAccess => Exception::LoadAddressMisaligned,
                MemoryError::AccessFault | MemoryError::TextWrite => Exception::LoadAccessFault,
            };
            Trap::new(exception, address, format!("load from {address:#010x}: {err}"))
        })?;
        self.registers.set_x(dest, value);
        self.next()
    }

    /// Operands `rs2, offset(rs1)`.
    pub fn store_op<F>(&mut self, operands: &Operands, op: F) -> ExecutionResult
    where
        F: FnOnce(&mut Memory, u32, u32) -> Result<(), MemoryError>,
    {
        let (src, offset, base) = (
            operands.register(0),
            operands.immediate(1),
            operands.register(2),
        );
        let value = self.registers.x(src);
        let address = self.registers.x(base).wrapping_add_signed(offset);
        op(&mut *self.memory, address, value).map_err(|err| {
            let exception = match err {
                MemoryError::MisalignedAccess => Exception::StoreOrAmoAddressMisaligned,
                MemoryError::AccessFault | MemoryError::TextWrite => {
                    Exception::StoreOrAmoAccessFault
                }
            };
            Trap::new(exception, address, format!("store to {address:#010x}: {err}"))
        })?;
        self.next()
    }

    /// Operands `rd, csr, rs1` or `rd, csr, uimm`.
    ///
    /// The old value of the CSR is read and the new value is written as a single operation, then
    /// the old value is written to `rd`. This makes `rd == rs1` behave as a swap.
    ///
    /// > For both CSRRS and CSRRC, if rs1=x0, then the instruction will not write to the CSR at all,
    /// > and so shall not cause any of the side effects that might otherwise occur on a CSR write,
    /// > such as raising illegal instruction exceptions on accesses to read-only CSRs.
    ///
    /// The same holds for CSRRSI and CSRRCI with `uimm == 0`.
    pub fn csr_op(&mut self, operands: &Operands, source: CsrSource, op: CsrOp) -> ExecutionResult {
        let dest = operands.register(0);
        let specifier = operands.unsigned(1) as CsrSpecifier;
        let (value, writes) = match source {
            CsrSource::Register => {
                let src = operands.register(2);
                (self.registers.x(src), src != Specifier::X0)
            }
            CsrSource::Immediate => {
                let uimm = operands.unsigned(2);
                (uimm, uimm != 0)
            }
        };
        let level = self.privilege_level;
        let old = match op {
            CsrOp::ReadWrite => self.csrs.swap(specifier, level, value),
            CsrOp::ReadSet if writes => self.csrs.set_bits(specifier, level, value),
            CsrOp::ReadClear if writes => self.csrs.clear_bits(specifier, level, value),
            CsrOp::ReadSet | CsrOp::ReadClear => self.csrs.read(specifier, level),
        }
        .map_err(|err| Trap::csr(self.raw, err))?;
        self.registers.set_x(dest, old);
        self.next()
    }

    /// Requests a service from the execution environment.
    pub fn environment_call(&mut self) -> ExecutionResult {
        self.environment
            .call(&mut *self.registers, &mut *self.memory, self.privilege_level)
    }

    pub fn breakpoint(&mut self) -> ExecutionResult {
        Ok(Outcome::Breakpoint)
    }

    /// Returns from a user trap handler.
    pub fn trap_return(&mut self) -> ExecutionResult {
        trap::return_from_handler(&mut *self.csrs, &mut *self.registers, self.raw)?;
        Ok(Outcome::Continue)
    }
}

fn misaligned_target(target: u32) -> Trap {
    Trap::new(
        Exception::InstructionAddressMisaligned,
        target,
        format!("jump target {target:#010x} is not word-aligned"),
    )
}
