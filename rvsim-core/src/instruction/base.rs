//! RV32I base integer instructions, plus `uret` from the user-level trap extension.

use super::InstructionDef;
use crate::core::{ExecutionResult, Executor};
use crate::format::{Format, Operands};

pub(super) const INSTRUCTIONS: &[InstructionDef] = &[
    // Upper immediates and jumps
    InstructionDef::new(
        "lui",
        Format::U,
        "ssssssssssssssssssss fffff 0110111",
        "lui t1, 10000",
        "Load upper immediate: set t1 to 20-bit followed by 12 0s",
        lui,
    ),
    InstructionDef::new(
        "auipc",
        Format::U,
        "ssssssssssssssssssss fffff 0010111",
        "auipc t1, 10000",
        "Add upper immediate to pc: set t1 to (pc plus an upper 20-bit immediate)",
        auipc,
    ),
    InstructionDef::new(
        "jal",
        Format::J,
        "ssssssssssssssssssss fffff 1101111",
        "jal t1, target",
        "Jump and link: set t1 to pc + 4 and jump to target",
        jal,
    ),
    InstructionDef::new(
        "jalr",
        Format::I,
        "tttttttttttt sssss 000 fffff 1100111",
        "jalr t1, t2, -100",
        "Jump and link register: set t1 to pc + 4 and jump to t2 + immediate",
        jalr,
    ),
    // Conditional branches
    InstructionDef::new(
        "beq",
        Format::B,
        "ttttttt sssss fffff 000 ttttt 1100011",
        "beq t1, t2, label",
        "Branch if equal: branch to statement at label's address if t1 and t2 are equal",
        beq,
    ),
    InstructionDef::new(
        "bne",
        Format::B,
        "ttttttt sssss fffff 001 ttttt 1100011",
        "bne t1, t2, label",
        "Branch if not equal: branch to statement at label's address if t1 and t2 are not equal",
        bne,
    ),
    InstructionDef::new(
        "blt",
        Format::B,
        "ttttttt sssss fffff 100 ttttt 1100011",
        "blt t1, t2, label",
        "Branch if less than: branch to statement at label's address if t1 is less than t2",
        blt,
    ),
    InstructionDef::new(
        "bge",
        Format::B,
        "ttttttt sssss fffff 101 ttttt 1100011",
        "bge t1, t2, label",
        "Branch if greater than or equal: branch to statement at label's address if t1 is greater \
         than or equal to t2",
        bge,
    ),
    InstructionDef::new(
        "bltu",
        Format::B,
        "ttttttt sssss fffff 110 ttttt 1100011",
        "bltu t1, t2, label",
        "Branch if less than (unsigned): branch to statement at label's address if t1 is less \
         than t2 (with an unsigned interpretation)",
        bltu,
    ),
    InstructionDef::new(
        "bgeu",
        Format::B,
        "ttttttt sssss fffff 111 ttttt 1100011",
        "bgeu t1, t2, label",
        "Branch if greater than or equal (unsigned): branch to statement at label's address if t1 \
         is greater than or equal to t2 (with an unsigned interpretation)",
        bgeu,
    ),
    // Loads and stores
    InstructionDef::new(
        "lb",
        Format::I,
        "ssssssssssss ttttt 000 fffff 0000011",
        "lb t1, -100(t2)",
        "Set t1 to sign-extended 8-bit value from effective memory byte address",
        lb,
    ),
    InstructionDef::new(
        "lh",
        Format::I,
        "ssssssssssss ttttt 001 fffff 0000011",
        "lh t1, -100(t2)",
        "Set t1 to sign-extended 16-bit value from effective memory halfword address",
        lh,
    ),
    InstructionDef::new(
        "lw",
        Format::I,
        "ssssssssssss ttttt 010 fffff 0000011",
        "lw t1, -100(t2)",
        "Set t1 to contents of effective memory word address",
        lw,
    ),
    InstructionDef::new(
        "lbu",
        Format::I,
        "ssssssssssss ttttt 100 fffff 0000011",
        "lbu t1, -100(t2)",
        "Set t1 to zero-extended 8-bit value from effective memory byte address",
        lbu,
    ),
    InstructionDef::new(
        "lhu",
        Format::I,
        "ssssssssssss ttttt 101 fffff 0000011",
        "lhu t1, -100(t2)",
        "Set t1 to zero-extended 16-bit value from effective memory halfword address",
        lhu,
    ),
    InstructionDef::new(
        "sb",
        Format::S,
        "sssssss fffff ttttt 000 sssss 0100011",
        "sb t1, -100(t2)",
        "Store byte: store the low-order 8 bits of t1 into the effective memory byte address",
        sb,
    ),
    InstructionDef::new(
        "sh",
        Format::S,
        "sssssss fffff ttttt 001 sssss 0100011",
        "sh t1, -100(t2)",
        "Store halfword: store the low-order 16 bits of t1 into the effective memory halfword \
         address",
        sh,
    ),
    InstructionDef::new(
        "sw",
        Format::S,
        "sssssss fffff ttttt 010 sssss 0100011",
        "sw t1, -100(t2)",
        "Store word: store contents of t1 into effective memory word address",
        sw,
    ),
    // Register-immediate operations
    InstructionDef::new(
        "addi",
        Format::I,
        "tttttttttttt sssss 000 fffff 0010011",
        "addi t1, t2, -100",
        "Addition immediate: set t1 to (t2 plus signed 12-bit immediate)",
        addi,
    ),
    InstructionDef::new(
        "slti",
        Format::I,
        "tttttttttttt sssss 010 fffff 0010011",
        "slti t1, t2, -100",
        "Set less than immediate: if t2 is less than sign-extended 12-bit immediate, then set t1 \
         to 1 else set t1 to 0",
        slti,
    ),
    InstructionDef::new(
        "sltiu",
        Format::I,
        "tttttttttttt sssss 011 fffff 0010011",
        "sltiu t1, t2, -100",
        "Set less than immediate unsigned: if t2 is less than sign-extended 12-bit immediate \
         using unsigned comparison, then set t1 to 1 else set t1 to 0",
        sltiu,
    ),
    InstructionDef::new(
        "xori",
        Format::I,
        "tttttttttttt sssss 100 fffff 0010011",
        "xori t1, t2, -100",
        "Bitwise XOR immediate: set t1 to bitwise XOR of t2 and sign-extended 12-bit immediate",
        xori,
    ),
    InstructionDef::new(
        "ori",
        Format::I,
        "tttttttttttt sssss 110 fffff 0010011",
        "ori t1, t2, -100",
        "Bitwise OR immediate: set t1 to bitwise OR of t2 and sign-extended 12-bit immediate",
        ori,
    ),
    InstructionDef::new(
        "andi",
        Format::I,
        "tttttttttttt sssss 111 fffff 0010011",
        "andi t1, t2, -100",
        "Bitwise AND immediate: set t1 to bitwise AND of t2 and sign-extended 12-bit immediate",
        andi,
    ),
    InstructionDef::new(
        "slli",
        Format::Shift,
        "0000000 ttttt sssss 001 fffff 0010011",
        "slli t1, t2, 10",
        "Shift left logical: set t1 to result of shifting t2 left by number of bits specified by \
         immediate",
        slli,
    ),
    InstructionDef::new(
        "srli",
        Format::Shift,
        "0000000 ttttt sssss 101 fffff 0010011",
        "srli t1, t2, 10",
        "Shift right logical: set t1 to result of shifting t2 right by number of bits specified \
         by immediate",
        srli,
    ),
    InstructionDef::new(
        "srai",
        Format::Shift,
        "0100000 ttttt sssss 101 fffff 0010011",
        "srai t1, t2, 10",
        "Shift right arithmetic: set t1 to result of sign-extended shifting t2 right by number of \
         bits specified by immediate",
        srai,
    ),
    // Register-register operations
    InstructionDef::new(
        "add",
        Format::R,
        "0000000 ttttt sssss 000 fffff 0110011",
        "add t1, t2, t3",
        "Addition: set t1 to (t2 plus t3)",
        add,
    ),
    InstructionDef::new(
        "sub",
        Format::R,
        "0100000 ttttt sssss 000 fffff 0110011",
        "sub t1, t2, t3",
        "Subtraction: set t1 to (t2 minus t3)",
        sub,
    ),
    InstructionDef::new(
        "sll",
        Format::R,
        "0000000 ttttt sssss 001 fffff 0110011",
        "sll t1, t2, t3",
        "Shift left logical: set t1 to result of shifting t2 left by number of bits specified by \
         value in low-order 5 bits of t3",
        sll,
    ),
    InstructionDef::new(
        "slt",
        Format::R,
        "0000000 ttttt sssss 010 fffff 0110011",
        "slt t1, t2, t3",
        "Set less than: if t2 is less than t3, then set t1 to 1 else set t1 to 0",
        slt,
    ),
    InstructionDef::new(
        "sltu",
        Format::R,
        "0000000 ttttt sssss 011 fffff 0110011",
        "sltu t1, t2, t3",
        "Set less than unsigned: if t2 is less than t3 using unsigned comparison, then set t1 to \
         1 else set t1 to 0",
        sltu,
    ),
    InstructionDef::new(
        "xor",
        Format::R,
        "0000000 ttttt sssss 100 fffff 0110011",
        "xor t1, t2, t3",
        "Bitwise XOR: set t1 to bitwise XOR of t2 and t3",
        xor,
    ),
    InstructionDef::new(
        "srl",
        Format::R,
        "0000000 ttttt sssss 101 fffff 0110011",
        "srl t1, t2, t3",
        "Shift right logical: set t1 to result of shifting t2 right by number of bits specified \
         by value in low-order 5 bits of t3",
        srl,
    ),
    InstructionDef::new(
        "sra",
        Format::R,
        "0100000 ttttt sssss 101 fffff 0110011",
        "sra t1, t2, t3",
        "Shift right arithmetic: set t1 to result of sign-extended shifting t2 right by number of \
         bits specified by value in low-order 5 bits of t3",
        sra,
    ),
    InstructionDef::new(
        "or",
        Format::R,
        "0000000 ttttt sssss 110 fffff 0110011",
        "or t1, t2, t3",
        "Bitwise OR: set t1 to bitwise OR of t2 and t3",
        or,
    ),
    InstructionDef::new(
        "and",
        Format::R,
        "0000000 ttttt sssss 111 fffff 0110011",
        "and t1, t2, t3",
        "Bitwise AND: set t1 to bitwise AND of t2 and t3",
        and,
    ),
    // System
    InstructionDef::new(
        "fence",
        Format::Fence,
        "0000 ffff ssss 00000 000 00000 0001111",
        "fence 1, 1",
        "Ensure that IO and memory accesses before the fence happen before the following IO and \
         memory accesses as viewed by a different thread",
        fence,
    ),
    InstructionDef::new(
        "fence.i",
        Format::I,
        "000000000000 00000 001 00000 0001111",
        "fence.i",
        "Ensure that stores to instruction memory are visible to instruction fetches",
        fence_i,
    ),
    InstructionDef::new(
        "ecall",
        Format::I,
        "000000000000 00000 000 00000 1110011",
        "ecall",
        "Issue a system call: execute the system call specified by the value in a7",
        ecall,
    ),
    InstructionDef::new(
        "ebreak",
        Format::I,
        "000000000001 00000 000 00000 1110011",
        "ebreak",
        "Pause execution",
        ebreak,
    ),
    InstructionDef::new(
        "uret",
        Format::I,
        "000000000010 00000 000 00000 1110011",
        "uret",
        "Return from handling an interrupt or exception (to uepc)",
        uret,
    ),
];

/// > LUI (load upper immediate) is used to build 32-bit constants and uses the U-type format.
/// > LUI places the U-immediate value in the top 20 bits of the destination register rd,
/// > filling in the lowest 12 bits with zeros.
fn lui(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.upper_imm_op(operands, |_, upper| upper)
}

/// > AUIPC (add upper immediate to pc) is used to build pc-relative addresses and uses the
/// > U-type format. AUIPC forms a 32-bit offset from the 20-bit U-immediate, filling in the
/// > lowest 12 bits with zeros, adds this offset to the address of the AUIPC instruction, then
/// > places the result in register rd.
fn auipc(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.upper_imm_op(operands, |pc, upper| pc.wrapping_add(upper))
}

/// > The jump and link (JAL) instruction uses the J-type format, where the J-immediate encodes a
/// > signed offset in multiples of 2 bytes. The offset is sign-extended and added to the address
/// > of the jump instruction to form the jump target address.
fn jal(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    let offset = operands.immediate(1);
    executor.jump_op(operands.register(0), |registers| {
        registers.pc().wrapping_add_signed(offset)
    })
}

/// > The target address is obtained by adding the sign-extended 12-bit I-immediate to the
/// > register rs1, then setting the least-significant bit of the result to zero.
fn jalr(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    let (base, offset) = (operands.register(1), operands.immediate(2));
    executor.jump_op(operands.register(0), |registers| {
        registers.x(base).wrapping_add_signed(offset) & !1
    })
}

fn beq(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| s1 == s2)
}

fn bne(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| s1 != s2)
}

fn blt(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| (s1 as i32) < (s2 as i32))
}

fn bge(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| (s1 as i32) >= (s2 as i32))
}

fn bltu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| s1 < s2)
}

fn bgeu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.cond_branch(operands, |s1, s2| s1 >= s2)
}

fn lb(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.load_op(operands, |memory, address| {
        memory.read_byte(address).map(|value| value as i8 as u32)
    })
}

fn lh(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.load_op(operands, |memory, address| {
        memory.read_halfword(address).map(|value| value as i16 as u32)
    })
}

fn lw(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.load_op(operands, |memory, address| memory.read_word(address))
}

fn lbu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.load_op(operands, |memory, address| {
        memory.read_byte(address).map(u32::from)
    })
}

fn lhu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.load_op(operands, |memory, address| {
        memory.read_halfword(address).map(u32::from)
    })
}

fn sb(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.store_op(operands, |memory, address, value| {
        memory.write_byte(address, value as u8)
    })
}

fn sh(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.store_op(operands, |memory, address, value| {
        memory.write_halfword(address, value as u16)
    })
}

fn sw(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.store_op(operands, |memory, address, value| {
        memory.write_word(address, value)
    })
}

/// > ADDI adds the sign-extended 12-bit immediate to register rs1. Arithmetic overflow is
/// > ignored and the result is simply the low XLEN bits of the result.
fn addi(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| s.wrapping_add_signed(imm))
}

fn slti(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| ((s as i32) < imm) as u32)
}

/// > SLTIU is similar but compares the values as unsigned numbers (i.e., the immediate is first
/// > sign-extended to XLEN bits then treated as an unsigned number).
fn sltiu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| (s < (imm as u32)) as u32)
}

fn xori(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| s ^ (imm as u32))
}

fn ori(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| s | (imm as u32))
}

fn andi(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_imm_op(operands, |s, imm| s & (imm as u32))
}

fn slli(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_shamt_op(operands, |s, shamt| s << shamt)
}

fn srli(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_shamt_op(operands, |s, shamt| s >> shamt)
}

/// > SRAI is an arithmetic right shift (the original sign bit is copied into the vacated upper
/// > bits).
fn srai(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_shamt_op(operands, |s, shamt| ((s as i32) >> shamt) as u32)
}

fn add(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1.wrapping_add(s2))
}

fn sub(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1.wrapping_sub(s2))
}

// Only the low 5 bits of rs2 hold the shift amount
fn sll(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1 << (s2 & 0x1F))
}

fn slt(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| ((s1 as i32) < (s2 as i32)) as u32)
}

fn sltu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| (s1 < s2) as u32)
}

fn xor(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1 ^ s2)
}

fn srl(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1 >> (s2 & 0x1F))
}

fn sra(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| ((s1 as i32) >> (s2 & 0x1F)) as u32)
}

fn or(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1 | s2)
}

fn and(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1 & s2)
}

// A single hart observes its own memory accesses in order, so fences have no effect.
fn fence(executor: &mut Executor<'_>, _: &Operands) -> ExecutionResult {
    executor.next()
}

// Stores to text are visible to later fetches, since modified words are always decoded anew.
fn fence_i(executor: &mut Executor<'_>, _: &Operands) -> ExecutionResult {
    executor.next()
}

fn ecall(executor: &mut Executor<'_>, _: &Operands) -> ExecutionResult {
    executor.environment_call()
}

fn ebreak(executor: &mut Executor<'_>, _: &Operands) -> ExecutionResult {
    executor.breakpoint()
}

fn uret(executor: &mut Executor<'_>, _: &Operands) -> ExecutionResult {
    executor.trap_return()
}

#[cfg(test)]
mod tests {
    use crate::core::trap::Fault;
    use crate::core::{Config, Core, Exception, Outcome};
    use crate::instruction::InstructionSet;
    use crate::program::ProgramStatement;
    use crate::registers::Specifier;
    use std::sync::Arc;

    const PC: u32 = 0x0040_0100;
    const DATA: u32 = 0x1001_0000;

    struct Harness {
        set: Arc<InstructionSet>,
        core: Core,
    }

    impl Harness {
        fn new() -> Self {
            let set = Arc::new(InstructionSet::standard());
            let core = Core::new(Arc::clone(&set), Config::default());
            Self { set, core }
        }

        fn with_registers(values: &[(u8, u32)]) -> Self {
            let mut harness = Self::new();
            for &(index, value) in values {
                harness.set_x(index, value);
            }
            harness
        }

        fn set_x(&mut self, index: u8, value: u32) {
            self.core
                .registers_mut()
                .set_x(Specifier::from_u5(index), value);
        }

        fn x(&self, index: u8) -> u32 {
            self.core.registers().x(Specifier::from_u5(index))
        }

        fn pc(&self) -> u32 {
            self.core.registers().pc()
        }

        fn run(&mut self, mnemonic: &str, operands: &[i32]) -> Result<Outcome, Fault> {
            let raw = self.set.encode(mnemonic, operands).unwrap();
            self.core.execute(&ProgramStatement::new(PC, raw))
        }

        fn run_ok(&mut self, mnemonic: &str, operands: &[i32]) {
            assert_eq!(Ok(Outcome::Continue), self.run(mnemonic, operands));
        }
    }

    #[test]
    fn test_reg_imm() {
        let mut harness = Harness::with_registers(&[(7, 5)]);
        harness.run_ok("addi", &[6, 7, -100]);
        assert_eq!(-95i32 as u32, harness.x(6));
        assert_eq!(PC + 4, harness.pc());
        harness.run_ok("slti", &[6, 7, -1]);
        assert_eq!(0, harness.x(6));
        harness.run_ok("sltiu", &[6, 7, -1]);
        assert_eq!(1, harness.x(6));
        harness.run_ok("xori", &[6, 7, -1]);
        assert_eq!(!5, harness.x(6));
        harness.run_ok("ori", &[6, 7, 0x10]);
        assert_eq!(0x15, harness.x(6));
        harness.run_ok("andi", &[6, 7, 4]);
        assert_eq!(4, harness.x(6));
    }

    #[test]
    fn test_shifts() {
        let mut harness = Harness::with_registers(&[(7, 0x8000_0010), (28, 0x24)]);
        harness.run_ok("slli", &[6, 7, 4]);
        assert_eq!(0x100, harness.x(6));
        harness.run_ok("srli", &[6, 7, 4]);
        assert_eq!(0x0800_0001, harness.x(6));
        harness.run_ok("srai", &[6, 7, 4]);
        assert_eq!(0xF800_0001, harness.x(6));
        // Only the low 5 bits of the shift amount count
        harness.run_ok("sll", &[6, 7, 28]);
        assert_eq!(0x100, harness.x(6));
        harness.run_ok("sra", &[6, 7, 28]);
        assert_eq!(0xF800_0001, harness.x(6));
        harness.run_ok("srl", &[6, 7, 28]);
        assert_eq!(0x0800_0001, harness.x(6));
    }

    #[test]
    fn test_reg_reg() {
        let mut harness = Harness::with_registers(&[(7, u32::MAX), (28, 2)]);
        harness.run_ok("add", &[6, 7, 28]);
        assert_eq!(1, harness.x(6));
        harness.run_ok("sub", &[6, 28, 7]);
        assert_eq!(3, harness.x(6));
        harness.run_ok("slt", &[6, 7, 28]);
        assert_eq!(1, harness.x(6));
        harness.run_ok("sltu", &[6, 7, 28]);
        assert_eq!(0, harness.x(6));
        harness.run_ok("xor", &[6, 7, 28]);
        assert_eq!(!2, harness.x(6));
        harness.run_ok("or", &[6, 28, 0]);
        assert_eq!(2, harness.x(6));
        harness.run_ok("and", &[6, 7, 28]);
        assert_eq!(2, harness.x(6));
        harness.run_ok("add", &[0, 7, 28]);
        assert_eq!(0, harness.x(0));
    }

    #[test]
    fn test_upper() {
        let mut harness = Harness::new();
        harness.run_ok("lui", &[6, 0xFFFFF]);
        assert_eq!(0xFFFF_F000, harness.x(6));
        harness.run_ok("auipc", &[6, 2]);
        assert_eq!(PC + 0x2000, harness.x(6));
    }

    #[test]
    fn test_jumps() {
        let mut harness = Harness::with_registers(&[(7, 0x0040_0201)]);
        harness.run_ok("jal", &[1, -0x100]);
        assert_eq!(PC - 0x100, harness.pc());
        assert_eq!(PC + 4, harness.x(1));
        harness.run_ok("jalr", &[6, 7, 3]);
        assert_eq!(0x0040_0204, harness.pc());
        assert_eq!(PC + 4, harness.x(6));

        // Link register and source may be the same
        harness.run_ok("jalr", &[7, 7, 0]);
        assert_eq!(0x0040_0200, harness.pc());
        assert_eq!(PC + 4, harness.x(7));

        let fault = harness.run("jalr", &[1, 0, 0x102]).unwrap_err();
        assert_eq!(Exception::InstructionAddressMisaligned, fault.exception());
        assert_eq!(PC + 4, harness.x(1));
    }

    #[test]
    fn test_branches() {
        let mut harness = Harness::with_registers(&[(5, -1i32 as u32), (6, 1)]);
        let cases = [
            ("beq", false),
            ("bne", true),
            ("blt", true),
            ("bge", false),
            ("bltu", false),
            ("bgeu", true),
        ];
        for (mnemonic, taken) in cases {
            harness.run_ok(mnemonic, &[5, 6, -8]);
            let expected = if taken { PC - 8 } else { PC + 4 };
            assert_eq!(expected, harness.pc(), "{mnemonic}");
        }
        let fault = harness.run("bne", &[5, 6, 2]).unwrap_err();
        assert_eq!(Exception::InstructionAddressMisaligned, fault.exception());
        assert_eq!(PC, fault.statement().address());
    }

    #[test]
    fn test_loads_and_stores() {
        let mut harness = Harness::with_registers(&[(5, DATA + 8), (6, 0x8765_43F1)]);
        harness.run_ok("sw", &[6, -8, 5]);
        harness.run_ok("sh", &[6, -4, 5]);
        harness.run_ok("sb", &[6, 0, 5]);
        let memory = harness.core.memory();
        assert_eq!(Ok(0x8765_43F1), memory.read_word(DATA));
        assert_eq!(Ok(0x43F1), memory.read_word(DATA + 4));
        assert_eq!(Ok(0xF1), memory.read_word(DATA + 8));

        harness.run_ok("lw", &[7, -8, 5]);
        assert_eq!(0x8765_43F1, harness.x(7));
        harness.run_ok("lh", &[7, -6, 5]);
        assert_eq!(0xFFFF_8765, harness.x(7));
        harness.run_ok("lhu", &[7, -6, 5]);
        assert_eq!(0x8765, harness.x(7));
        harness.run_ok("lb", &[7, 0, 5]);
        assert_eq!(0xFFFF_FFF1, harness.x(7));
        harness.run_ok("lbu", &[7, 0, 5]);
        assert_eq!(0xF1, harness.x(7));
    }

    #[test]
    fn test_memory_faults() {
        let mut harness = Harness::with_registers(&[(5, DATA), (7, 3)]);
        let fault = harness.run("lw", &[7, 2, 5]).unwrap_err();
        assert_eq!(Exception::LoadAddressMisaligned, fault.exception());
        assert_eq!(DATA + 2, fault.trap().value());
        assert_eq!(3, harness.x(7));
        let fault = harness.run("sh", &[7, 1, 5]).unwrap_err();
        assert_eq!(Exception::StoreOrAmoAddressMisaligned, fault.exception());
        let fault = harness.run("sw", &[7, 0, 0]).unwrap_err();
        assert_eq!(Exception::StoreOrAmoAccessFault, fault.exception());
        let fault = harness.run("lb", &[7, 0, 0]).unwrap_err();
        assert_eq!(Exception::LoadAccessFault, fault.exception());
        assert_eq!(PC, harness.pc());
        assert_eq!(Ok(0), harness.core.memory().read_word(DATA));
    }

    #[test]
    fn test_misaligned_supported() {
        let set = Arc::new(InstructionSet::standard());
        let config = Config {
            support_misaligned_memory_access: true,
            ..Config::default()
        };
        let mut harness = Harness {
            core: Core::new(Arc::clone(&set), config),
            set,
        };
        harness.set_x(5, DATA);
        harness.set_x(6, 0x1122_3344);
        harness.run_ok("sw", &[6, 1, 5]);
        harness.run_ok("lw", &[7, 1, 5]);
        assert_eq!(0x1122_3344, harness.x(7));
    }

    #[test]
    fn test_system() {
        let mut harness = Harness::new();
        harness.run_ok("fence", &[1, 1]);
        harness.run_ok("fence.i", &[]);
        assert_eq!(PC + 4, harness.pc());
        assert_eq!(Ok(Outcome::Breakpoint), harness.run("ebreak", &[]));
        assert_eq!(PC, harness.pc());

        harness.set_x(17, 10);
        assert_eq!(Ok(Outcome::Exit(0)), harness.run("ecall", &[]));
        harness.set_x(17, 93);
        harness.set_x(10, 4);
        assert_eq!(Ok(Outcome::Exit(4)), harness.run("ecall", &[]));
        harness.set_x(17, 1);
        harness.run_ok("ecall", &[]);
        assert_eq!("4", harness.core.environment().stdout_lossy());
        harness.set_x(17, 77);
        let fault = harness.run("ecall", &[]).unwrap_err();
        assert_eq!(Exception::EnvironmentCallFromUMode, fault.exception());
    }
}
