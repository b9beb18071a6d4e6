//! Instruction formats and the bit templates instructions are declared with.
//!
//! A template is a 32-character string (spaces are ignored) read from bit 31 down to bit 0.
//! `0` and `1` are fixed bits, the letters `f`, `s`, `t` and `q` mark the bits of the first,
//! second, third and fourth operand. Operands are numbered in assembly-syntax order, so e.g.
//! `lw rd, imm(rs1)` is written as
//!
//! ```text
//! ssssssssssss ttttt 010 fffff 0000011
//! ```
//!
//! Operand bits are gathered in template order (most significant first). For branch and jump
//! immediates this yields the scrambled hardware layout, which the [`Format`] puts back in order.

use crate::registers::Specifier;
use std::fmt;
use std::ops::Index;
use thiserror::Error;

/// Maximum number of operands a template can declare.
pub const MAX_OPERANDS: usize = 4;

const OPERAND_LETTERS: [char; MAX_OPERANDS] = ['f', 's', 't', 'q'];

const OPCODE_MASK: u32 = 0x0000_007F;
const RD_SLOT: u32 = 0x0000_0F80;
const RS1_SLOT: u32 = 0x000F_8000;
const RS2_SLOT: u32 = 0x01F0_0000;

/// The fixed instruction shapes of the base ISA, plus the specialized forms used by shifts, CSR
/// accesses and fences.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Format {
    /// Register-register: `rd`, `rs1`, `rs2`.
    R,
    /// Register-immediate with a sign-extended 12-bit immediate.
    I,
    /// Register-immediate shifts, whose `rs2` slot holds a 5-bit shift amount.
    Shift,
    /// Stores: `rs1`, `rs2` and a sign-extended 12-bit immediate split over two fields.
    S,
    /// Conditional branches: `rs1`, `rs2` and a 13-bit even offset.
    B,
    /// Upper immediates: `rd` and a 20-bit immediate.
    U,
    /// Jumps: `rd` and a 21-bit even offset.
    J,
    /// CSR accesses with a register source: `rd`, `rs1` and a 12-bit CSR address.
    Csr,
    /// CSR accesses with a 5-bit zero-extended immediate in the `rs1` slot.
    CsrImm,
    /// Memory ordering: the predecessor and successor sets in bits 27:20.
    Fence,
}

impl Format {
    /// Bits that may hold operands. Everything else must be fixed by the template.
    pub fn operand_mask(self) -> u32 {
        match self {
            Self::R | Self::Shift => RD_SLOT | RS1_SLOT | RS2_SLOT,
            Self::I | Self::S | Self::B | Self::Csr | Self::CsrImm => 0xFFF0_0000 | RS1_SLOT | RD_SLOT,
            Self::U | Self::J => 0xFFFF_F000 | RD_SLOT,
            Self::Fence => 0x0FF0_0000,
        }
    }

    /// Slots that hold register specifiers in this format.
    fn register_slots(self) -> &'static [u32] {
        match self {
            Self::R => &[RD_SLOT, RS1_SLOT, RS2_SLOT],
            Self::I | Self::Shift | Self::Csr => &[RD_SLOT, RS1_SLOT],
            Self::S | Self::B => &[RS1_SLOT, RS2_SLOT],
            Self::U | Self::J | Self::CsrImm => &[RD_SLOT],
            Self::Fence => &[],
        }
    }

    /// How the immediate operands of this format are extended.
    pub fn immediate(self) -> Immediate {
        match self {
            Self::I | Self::S => Immediate::Signed,
            Self::B => Immediate::Branch,
            Self::J => Immediate::Jump,
            Self::R | Self::Shift | Self::U | Self::Csr | Self::CsrImm | Self::Fence => {
                Immediate::Unsigned
            }
        }
    }
}

/// Extension rule for an immediate operand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Immediate {
    /// Sign-extended from its top bit.
    Signed,
    /// Zero-extended.
    Unsigned,
    /// B-type offset: bits `[12|10:5|4:1|11]`, sign-extended from bit 12, always even.
    Branch,
    /// J-type offset: bits `[20|10:1|11|19:12]`, sign-extended from bit 20, always even.
    Jump,
}

impl Immediate {
    /// Turn the `width` raw bits gathered from an instruction into the operand value.
    fn extend(self, gathered: u32, width: u32) -> i32 {
        match self {
            Self::Signed => sign_extend(gathered, width),
            Self::Unsigned => gathered as i32,
            Self::Branch => {
                let imm = ((gathered >> 11) & 1) << 12
                    | (gathered & 1) << 11
                    | ((gathered >> 5) & 0x3F) << 5
                    | ((gathered >> 1) & 0xF) << 1;
                sign_extend(imm, 13)
            }
            Self::Jump => {
                let imm = ((gathered >> 19) & 1) << 20
                    | (gathered & 0xFF) << 12
                    | ((gathered >> 8) & 1) << 11
                    | ((gathered >> 9) & 0x3FF) << 1;
                sign_extend(imm, 21)
            }
        }
    }

    /// Inverse of [`extend`](Self::extend). Returns `None` if `value` is not representable.
    fn compress(self, value: i32, width: u32) -> Option<u32> {
        match self {
            Self::Signed => fits_signed(value, width).then_some(value as u32 & low_bits(width)),
            Self::Unsigned => {
                (value >= 0 && value as u32 <= low_bits(width)).then_some(value as u32)
            }
            Self::Branch => {
                if value & 1 != 0 || !fits_signed(value, 13) {
                    return None;
                }
                let imm = value as u32;
                Some(
                    ((imm >> 12) & 1) << 11
                        | ((imm >> 5) & 0x3F) << 5
                        | ((imm >> 1) & 0xF) << 1
                        | (imm >> 11) & 1,
                )
            }
            Self::Jump => {
                if value & 1 != 0 || !fits_signed(value, 21) {
                    return None;
                }
                let imm = value as u32;
                Some(
                    ((imm >> 20) & 1) << 19
                        | ((imm >> 1) & 0x3FF) << 9
                        | ((imm >> 11) & 1) << 8
                        | (imm >> 12) & 0xFF,
                )
            }
        }
    }
}

/// What an operand field holds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OperandKind {
    Register,
    Immediate(Immediate),
}

/// One operand field of a [`Template`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Field {
    /// Bit positions, most significant first.
    positions: Vec<u8>,
    kind: OperandKind,
}

impl Field {
    pub fn kind(&self) -> OperandKind {
        self.kind
    }

    /// Number of instruction bits this field occupies.
    pub fn width(&self) -> u32 {
        self.positions.len() as u32
    }

    fn gather(&self, raw: u32) -> u32 {
        self.positions
            .iter()
            .fold(0, |acc, &position| (acc << 1) | ((raw >> position) & 1))
    }

    fn scatter(&self, bits: u32) -> u32 {
        let width = self.positions.len();
        self.positions
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &position)| {
                acc | ((bits >> (width - 1 - i)) & 1) << position
            })
    }
}

/// A parsed instruction template: fixed-bit mask and value plus the operand fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Template {
    format: Format,
    mask: u32,
    value: u32,
    fields: Vec<Field>,
}

impl Template {
    /// Parse `text` as a template for an instruction of the given `format`.
    pub fn parse(text: &str, format: Format) -> Result<Self, TemplateError> {
        let bits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if bits.len() != 32 {
            return Err(TemplateError::Length(bits.len()));
        }

        let mut mask = 0;
        let mut value = 0;
        let mut positions: [Vec<u8>; MAX_OPERANDS] = Default::default();
        for (i, &c) in bits.iter().enumerate() {
            let position = 31 - i as u8;
            match c {
                '0' => mask |= 1 << position,
                '1' => {
                    mask |= 1 << position;
                    value |= 1 << position;
                }
                _ => match OPERAND_LETTERS.iter().position(|&letter| letter == c) {
                    Some(operand) => positions[operand].push(position),
                    None => return Err(TemplateError::InvalidCharacter(c)),
                },
            }
        }

        if mask & OPCODE_MASK != OPCODE_MASK {
            return Err(TemplateError::OpcodeNotFixed);
        }
        let stray = !mask & !format.operand_mask();
        if stray != 0 {
            return Err(TemplateError::FormatMismatch {
                format,
                bits: stray,
            });
        }

        let count = positions.iter().take_while(|p| !p.is_empty()).count();
        if let Some(gap) = positions[count..].iter().position(|p| !p.is_empty()) {
            return Err(TemplateError::OperandGap(OPERAND_LETTERS[count + gap]));
        }

        let mut fields = Vec::with_capacity(count);
        for (operand, positions) in positions.into_iter().take(count).enumerate() {
            let field_mask = positions.iter().fold(0u32, |acc, &p| acc | 1 << p);
            let kind = if format.register_slots().contains(&field_mask) {
                OperandKind::Register
            } else {
                OperandKind::Immediate(format.immediate())
            };
            let expected = match kind {
                OperandKind::Immediate(Immediate::Branch) => Some(12),
                OperandKind::Immediate(Immediate::Jump) => Some(20),
                _ => None,
            };
            if let Some(expected) = expected.filter(|&e| e != positions.len()) {
                return Err(TemplateError::ImmediateWidth {
                    letter: OPERAND_LETTERS[operand],
                    width: positions.len(),
                    expected,
                });
            }
            fields.push(Field { positions, kind });
        }

        Ok(Self {
            format,
            mask,
            value,
            fields,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Bits fixed by this template.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Values of the fixed bits (zero outside [`mask`](Self::mask)).
    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The major opcode (bits 6:0), always fixed.
    pub fn opcode(&self) -> u8 {
        (self.value & OPCODE_MASK) as u8
    }

    /// Returns `true` if `raw` has this template's fixed bits.
    pub fn matches(&self, raw: u32) -> bool {
        raw & self.mask == self.value
    }

    /// Returns `true` if some 32-bit word would match both templates.
    pub fn collides_with(&self, other: &Template) -> bool {
        let common = self.mask & other.mask;
        (self.value ^ other.value) & common == 0
    }

    /// Extract the operands of `raw` in operand order.
    ///
    /// Total: bits fixed by the template are ignored, so this never fails.
    pub fn decode(&self, raw: u32) -> Operands {
        let mut operands = Operands::default();
        for field in &self.fields {
            let gathered = field.gather(raw);
            let value = match field.kind {
                OperandKind::Register => gathered as i32,
                OperandKind::Immediate(immediate) => immediate.extend(gathered, field.width()),
            };
            operands.push(value);
        }
        operands
    }

    /// Build the instruction word for `operands`, checking that each one fits its field.
    pub fn encode(&self, operands: &[i32]) -> Result<u32, EncodeError> {
        if operands.len() != self.fields.len() {
            return Err(EncodeError::Arity {
                expected: self.fields.len(),
                found: operands.len(),
            });
        }
        let mut raw = self.value;
        for (index, (field, &value)) in self.fields.iter().zip(operands).enumerate() {
            let bits = match field.kind {
                OperandKind::Register => (0..32).contains(&value).then_some(value as u32),
                OperandKind::Immediate(immediate) => immediate.compress(value, field.width()),
            };
            let bits = bits.ok_or(EncodeError::OutOfRange {
                index,
                value,
                kind: field.kind,
                width: field.width(),
            })?;
            raw |= field.scatter(bits);
        }
        Ok(raw)
    }
}

/// Decoded operand values, in operand order.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Operands {
    values: [i32; MAX_OPERANDS],
    len: u8,
}

impl Operands {
    /// Returns `None` if more than [`MAX_OPERANDS`] values are given.
    pub fn from_slice(values: &[i32]) -> Option<Self> {
        (values.len() <= MAX_OPERANDS).then(|| {
            let mut operands = Self::default();
            values.iter().for_each(|&value| operands.push(value));
            operands
        })
    }

    fn push(&mut self, value: i32) {
        self.values[self.len as usize] = value;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.values[..self.len as usize]
    }

    /// Operand `index` as a register specifier.
    pub fn register(&self, index: usize) -> Specifier {
        Specifier::from_u5((self[index] & 0x1F) as u8)
    }

    /// Operand `index` as a (sign-extended) immediate.
    pub fn immediate(&self, index: usize) -> i32 {
        self[index]
    }

    /// Operand `index` reinterpreted as an unsigned value.
    pub fn unsigned(&self, index: usize) -> u32 {
        self[index] as u32
    }
}

impl Index<usize> for Operands {
    type Output = i32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

fn fits_signed(value: i32, width: u32) -> bool {
    let shift = 32 - width;
    (value << shift) >> shift == value
}

fn low_bits(width: u32) -> u32 {
    u32::MAX >> (32 - width)
}

/// Errors in an instruction template. These are catalog bugs, reported at registration.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum TemplateError {
    #[error("template must describe 32 bits, found {0}")]
    Length(usize),
    #[error("invalid template character {0:?}")]
    InvalidCharacter(char),
    #[error("operand `{0}` is used without all operands before it")]
    OperandGap(char),
    #[error("template leaves opcode bits unspecified")]
    OpcodeNotFixed,
    #[error("{format:?}-format template leaves bits {bits:#010x} variable outside operand fields")]
    FormatMismatch { format: Format, bits: u32 },
    #[error("operand `{letter}` spans {width} bits where {expected} are required")]
    ImmediateWidth {
        letter: char,
        width: usize,
        expected: usize,
    },
}

/// Errors when building an instruction word from operand values.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum EncodeError {
    #[error("expected {expected} operands, found {found}")]
    Arity { expected: usize, found: usize },
    #[error("operand {index} ({value}) does not fit in a {width}-bit {kind} field")]
    OutOfRange {
        index: usize,
        value: i32,
        kind: OperandKind,
        width: u32,
    },
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandKind::Register => "register",
            OperandKind::Immediate(Immediate::Signed) => "signed",
            OperandKind::Immediate(Immediate::Unsigned) => "unsigned",
            OperandKind::Immediate(Immediate::Branch) => "branch offset",
            OperandKind::Immediate(Immediate::Jump) => "jump offset",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Immediate layouts written out per field, straight from the base ISA encoding tables.
    fn i_imm(raw: u32) -> i32 {
        raw as i32 >> 20
    }

    fn s_imm(raw: u32) -> i32 {
        let imm_11_5 = raw & 0xFE00_0000;
        let imm_4_0 = raw & 0x0000_0F80;
        (imm_11_5 | (imm_4_0 << 13)) as i32 >> 20
    }

    fn b_imm(raw: u32) -> i32 {
        let imm_12 = raw & 0x8000_0000;
        let imm_11 = raw & 0x0000_0080;
        let imm_10_5 = raw & 0x7E00_0000;
        let imm_4_1 = raw & 0x0000_0F00;
        (imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19
    }

    fn j_imm(raw: u32) -> i32 {
        let imm_20 = raw & 0x8000_0000;
        let imm_19_12 = raw & 0x000F_F000;
        let imm_11 = raw & 0x0010_0000;
        let imm_10_1 = raw & 0x7FE0_0000;
        (imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11
    }

    // Cheap deterministic word generator, enough to spread bits over all fields.
    fn words() -> impl Iterator<Item = u32> {
        let mut state = 0x1234_5678u32;
        (0..4096).map(move |_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        })
    }

    #[test]
    fn test_parse_masks() {
        let addi = Template::parse("tttttttttttt sssss 000 fffff 0010011", Format::I).unwrap();
        assert_eq!(0x0000_707F, addi.mask());
        assert_eq!(0x0000_0013, addi.value());
        assert_eq!(0x13, addi.opcode());
        assert_eq!(3, addi.fields().len());
        assert_eq!(OperandKind::Register, addi.fields()[0].kind());
        assert_eq!(OperandKind::Register, addi.fields()[1].kind());
        assert_eq!(OperandKind::Immediate(Immediate::Signed), addi.fields()[2].kind());

        let sub = Template::parse("0100000 ttttt sssss 000 fffff 0110011", Format::R).unwrap();
        assert_eq!(0xFE00_707F, sub.mask());
        assert_eq!(0x4000_0033, sub.value());

        let ecall = Template::parse("000000000000 00000 000 00000 1110011", Format::I).unwrap();
        assert_eq!(u32::MAX, ecall.mask());
        assert!(ecall.fields().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Err(TemplateError::Length(31)),
            Template::parse("tttttttttttt sssss 000 fffff 001001", Format::I)
        );
        assert_eq!(
            Err(TemplateError::InvalidCharacter('x')),
            Template::parse("tttttttttttt sssss 000 xxxxx 0010011", Format::I)
        );
        assert_eq!(
            Err(TemplateError::OpcodeNotFixed),
            Template::parse("000000000000 00000 000 00000 fffffff", Format::I)
        );
        assert_eq!(
            Err(TemplateError::OperandGap('t')),
            Template::parse("tttttttttttt 00000 000 fffff 0010011", Format::I)
        );
        assert!(matches!(
            Template::parse("0000000 ttttt sssss fff fffff 0110011", Format::R),
            Err(TemplateError::FormatMismatch { bits: 0x7000, .. })
        ));
        assert!(matches!(
            Template::parse("0000000 sssss fffff 000 00000 1100011", Format::B),
            Ok(_)
        ));
        assert!(matches!(
            Template::parse("0ttttt0 sssss fffff 000 ttttt 1100011", Format::B),
            Err(TemplateError::ImmediateWidth { letter: 't', width: 10, expected: 12 })
        ));
    }

    #[test]
    fn test_register_slot_kinds() {
        let slli = Template::parse("0000000 ttttt sssss 001 fffff 0010011", Format::Shift).unwrap();
        assert_eq!(OperandKind::Immediate(Immediate::Unsigned), slli.fields()[2].kind());
        let csrrwi = Template::parse("ssssssssssss ttttt 101 fffff 1110011", Format::CsrImm).unwrap();
        assert_eq!(OperandKind::Register, csrrwi.fields()[0].kind());
        assert_eq!(OperandKind::Immediate(Immediate::Unsigned), csrrwi.fields()[1].kind());
        assert_eq!(OperandKind::Immediate(Immediate::Unsigned), csrrwi.fields()[2].kind());
    }

    #[test]
    fn test_decode_matches_hardware_layout() {
        let addi = Template::parse("tttttttttttt sssss 000 fffff 0010011", Format::I).unwrap();
        let sw = Template::parse("sssssss fffff ttttt 010 sssss 0100011", Format::S).unwrap();
        let beq = Template::parse("ttttttt sssss fffff 000 ttttt 1100011", Format::B).unwrap();
        let jal = Template::parse("ssssssssssssssssssss fffff 1101111", Format::J).unwrap();
        let lui = Template::parse("ssssssssssssssssssss fffff 0110111", Format::U).unwrap();
        for raw in words() {
            let rd = ((raw >> 7) & 0x1F) as i32;
            let rs1 = ((raw >> 15) & 0x1F) as i32;
            let rs2 = ((raw >> 20) & 0x1F) as i32;
            assert_eq!([rd, rs1, i_imm(raw)], addi.decode(raw).as_slice());
            assert_eq!([rs2, s_imm(raw), rs1], sw.decode(raw).as_slice());
            assert_eq!([rs1, rs2, b_imm(raw)], beq.decode(raw).as_slice());
            assert_eq!([rd, j_imm(raw)], jal.decode(raw).as_slice());
            assert_eq!([rd, (raw >> 12) as i32], lui.decode(raw).as_slice());
        }
    }

    #[test]
    fn test_sign_extension() {
        let addi = Template::parse("tttttttttttt sssss 000 fffff 0010011", Format::I).unwrap();
        assert_eq!(-2048, addi.decode(0x8000_0000).immediate(2));
        assert_eq!(-1, addi.decode(0xFFF0_0000).immediate(2));
        assert_eq!(2047, addi.decode(0x7FF0_0000).immediate(2));
        let beq = Template::parse("ttttttt sssss fffff 000 ttttt 1100011", Format::B).unwrap();
        assert_eq!(-4096, beq.decode(0x8000_0000).immediate(2));
        assert_eq!(-2, beq.decode(0xFE00_0F80).immediate(2));
        let jal = Template::parse("ssssssssssssssssssss fffff 1101111", Format::J).unwrap();
        assert_eq!(-(1 << 20), jal.decode(0x8000_0000).immediate(1));
    }

    #[test]
    fn test_encode() {
        let beq = Template::parse("ttttttt sssss fffff 000 ttttt 1100011", Format::B).unwrap();
        for offset in [-4096, -2, 0, 2, 8, 2046, 2048, 4094] {
            let raw = beq.encode(&[5, 6, offset]).unwrap();
            assert_eq!([5, 6, offset], beq.decode(raw).as_slice());
        }
        assert!(beq.encode(&[5, 6, 3]).is_err());
        assert!(beq.encode(&[5, 6, 4096]).is_err());
        assert!(beq.encode(&[32, 6, 0]).is_err());

        let jal = Template::parse("ssssssssssssssssssss fffff 1101111", Format::J).unwrap();
        // jal x0, -8
        assert_eq!(0xFF9F_F06F, jal.encode(&[0, -8]).unwrap());

        let csrrwi = Template::parse("ssssssssssss ttttt 101 fffff 1110011", Format::CsrImm).unwrap();
        // csrrwi t0, 10, 31
        assert_eq!(0x00AF_D2F3, csrrwi.encode(&[5, 10, 31]).unwrap());
        assert_eq!(
            Err(EncodeError::OutOfRange {
                index: 2,
                value: 0xFF,
                kind: OperandKind::Immediate(Immediate::Unsigned),
                width: 5,
            }),
            csrrwi.encode(&[5, 10, 0xFF])
        );
        assert_eq!(
            Err(EncodeError::Arity {
                expected: 3,
                found: 2
            }),
            csrrwi.encode(&[5, 10])
        );
    }

    #[test]
    fn test_collisions() {
        let add = Template::parse("0000000 ttttt sssss 000 fffff 0110011", Format::R).unwrap();
        let sub = Template::parse("0100000 ttttt sssss 000 fffff 0110011", Format::R).unwrap();
        let addi = Template::parse("tttttttttttt sssss 000 fffff 0010011", Format::I).unwrap();
        let nop = Template::parse("000000000000 00000 000 00000 0010011", Format::I).unwrap();
        assert!(!add.collides_with(&sub));
        assert!(!add.collides_with(&addi));
        assert!(addi.collides_with(&nop));
        assert!(nop.collides_with(&addi));
        assert!(add.collides_with(&add));
    }

    #[test]
    fn test_operands() {
        let operands = Operands::from_slice(&[5, -1, 37]).unwrap();
        assert_eq!(3, operands.len());
        assert_eq!(Specifier::T0, operands.register(0));
        assert_eq!(-1, operands.immediate(1));
        assert_eq!(u32::MAX, operands.unsigned(1));
        assert_eq!(Specifier::from_u5(5), operands.register(2));
        assert!(Operands::from_slice(&[0; 5]).is_none());
        assert!(Operands::default().is_empty());
    }
}
