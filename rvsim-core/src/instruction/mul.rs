//! "M" extension for integer multiplication and division.
//!
//! None of these instructions trap. Division by zero and signed overflow have defined results:
//!
//! | Condition              | Dividend  | Divisor | DIVU        | REMU | DIV        | REM |
//! |------------------------|-----------|---------|-------------|------|------------|-----|
//! | Division by zero       | x         | 0       | 2^XLEN - 1  | x    | -1         | x   |
//! | Overflow (signed only) | -2^XLEN-1 | -1      | -           | -    | -2^XLEN-1  | 0   |

use super::InstructionDef;
use crate::core::{ExecutionResult, Executor};
use crate::format::{Format, Operands};

pub(super) const INSTRUCTIONS: &[InstructionDef] = &[
    InstructionDef::new(
        "mul",
        Format::R,
        "0000001 ttttt sssss 000 fffff 0110011",
        "mul t1, t2, t3",
        "Multiplication: set t1 to the lower 32 bits of t2*t3",
        mul,
    ),
    InstructionDef::new(
        "mulh",
        Format::R,
        "0000001 ttttt sssss 001 fffff 0110011",
        "mulh t1, t2, t3",
        "Multiplication: set t1 to the upper 32 bits of t2*t3 using signed multiplication",
        mulh,
    ),
    InstructionDef::new(
        "mulhsu",
        Format::R,
        "0000001 ttttt sssss 010 fffff 0110011",
        "mulhsu t1, t2, t3",
        "Multiplication: set t1 to the upper 32 bits of t2*t3 where t2 is signed and t3 is \
         unsigned",
        mulhsu,
    ),
    InstructionDef::new(
        "mulhu",
        Format::R,
        "0000001 ttttt sssss 011 fffff 0110011",
        "mulhu t1, t2, t3",
        "Multiplication: set t1 to the upper 32 bits of t2*t3 using unsigned multiplication",
        mulhu,
    ),
    InstructionDef::new(
        "div",
        Format::R,
        "0000001 ttttt sssss 100 fffff 0110011",
        "div t1, t2, t3",
        "Division: set t1 to the result of t2/t3",
        div,
    ),
    InstructionDef::new(
        "divu",
        Format::R,
        "0000001 ttttt sssss 101 fffff 0110011",
        "divu t1, t2, t3",
        "Division: set t1 to the result of t2/t3 using unsigned division",
        divu,
    ),
    InstructionDef::new(
        "rem",
        Format::R,
        "0000001 ttttt sssss 110 fffff 0110011",
        "rem t1, t2, t3",
        "Remainder: set t1 to the remainder of t2/t3",
        rem,
    ),
    InstructionDef::new(
        "remu",
        Format::R,
        "0000001 ttttt sssss 111 fffff 0110011",
        "remu t1, t2, t3",
        "Remainder: set t1 to the remainder of t2/t3 using unsigned division",
        remu,
    ),
];

fn mul(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1.wrapping_mul(s2))
}

fn mulh(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| {
        let product = i64::from(s1 as i32) * i64::from(s2 as i32);
        (product >> 32) as u32
    })
}

fn mulhsu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| {
        let product = i64::from(s1 as i32).wrapping_mul(i64::from(s2));
        (product >> 32) as u32
    })
}

fn mulhu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| {
        let product = u64::from(s1) * u64::from(s2);
        (product >> 32) as u32
    })
}

fn div(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| {
        let (dividend, divisor) = (s1 as i32, s2 as i32);
        if divisor == 0 {
            u32::MAX
        } else {
            // `i32::MIN / -1` wraps to `i32::MIN`
            dividend.wrapping_div(divisor) as u32
        }
    })
}

fn divu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1.checked_div(s2).unwrap_or(u32::MAX))
}

fn rem(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| {
        let (dividend, divisor) = (s1 as i32, s2 as i32);
        if divisor == 0 {
            s1
        } else {
            // `i32::MIN % -1` wraps to 0
            dividend.wrapping_rem(divisor) as u32
        }
    })
}

fn remu(executor: &mut Executor<'_>, operands: &Operands) -> ExecutionResult {
    executor.reg_reg_op(operands, |s1, s2| s1.checked_rem(s2).unwrap_or(s1))
}
