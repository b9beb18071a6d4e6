//! A small assembler for basic RISC-V assembly.
//!
//! Each line holds any number of labels followed by at most one directive or basic instruction.
//! Pseudo-instructions and relocation functions are not supported; operands are written in the
//! order of the instruction's template, with `imm(reg)` expanding to `imm, reg`.
//!
//! ```text
//!         .data
//! msg:    .asciz "hello\n"
//!         .text
//! main:   lui  a0, 0x10010      # address of msg
//!         addi a7, zero, 4
//!         ecall
//! ```

use crate::core::memory::MemoryConfig;
use crate::cs_registers::CsrFile;
use crate::format::{Format, Immediate, OperandKind};
use crate::instruction::{Instruction, InstructionSet};
use crate::program::{
    Assembler, AssemblyErrors, ErrorMessage, ProgramImage, ProgramStatement, Severity, SourceFile,
    SourceLocation,
};
use crate::registers::Specifier;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// Assembles basic instructions and data directives, see the [module docs](self).
#[derive(Debug, Copy, Clone, Default)]
pub struct BasicAssembler;

impl BasicAssembler {
    pub fn new() -> Self {
        Self
    }
}

impl Assembler for BasicAssembler {
    fn assemble(
        &self,
        instruction_set: &InstructionSet,
        memory: &MemoryConfig,
        files: &[SourceFile],
    ) -> Result<(ProgramImage, AssemblyErrors), AssemblyErrors> {
        let mut layout = Layout::new(memory);
        for file in files {
            for (index, text) in file.text.lines().enumerate() {
                let location = SourceLocation {
                    file: file.name.clone(),
                    line: index + 1,
                    text: strip_comment(text).trim().to_owned(),
                };
                layout.line(location);
            }
        }
        layout.finish(instruction_set)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Section {
    Text,
    Data,
}

#[derive(Debug)]
struct PendingStatement {
    address: u32,
    mnemonic: String,
    operands: Vec<String>,
    location: Arc<SourceLocation>,
}

/// A `.word` whose value is the address of a label.
#[derive(Debug)]
struct Fixup {
    offset: usize,
    label: String,
    location: Arc<SourceLocation>,
}

/// First pass: assigns addresses to statements and labels, and lays out the data section.
#[derive(Debug)]
struct Layout {
    section: Section,
    text_address: u32,
    data_base: u32,
    data_end: u32,
    data: Vec<u8>,
    labels: HashMap<String, u32>,
    statements: Vec<PendingStatement>,
    fixups: Vec<Fixup>,
    diagnostics: AssemblyErrors,
}

impl Layout {
    fn new(memory: &MemoryConfig) -> Self {
        Self {
            section: Section::Text,
            text_address: memory.text.start(),
            data_base: memory.data_base,
            data_end: memory.data.end(),
            data: Vec::new(),
            labels: HashMap::new(),
            statements: Vec::new(),
            fixups: Vec::new(),
            diagnostics: AssemblyErrors::new(),
        }
    }

    fn report(&mut self, severity: Severity, location: &SourceLocation, message: String) {
        self.diagnostics.push(ErrorMessage {
            severity,
            file: location.file.clone(),
            line: location.line,
            message,
        });
    }

    fn data_address(&self) -> u32 {
        self.data_base.wrapping_add(self.data.len() as u32)
    }

    fn align_data(&mut self, alignment: usize) {
        let misalignment = self.data_address() as usize % alignment;
        if misalignment != 0 {
            self.data.resize(self.data.len() + alignment - misalignment, 0);
        }
    }

    fn line(&mut self, location: SourceLocation) {
        let location = Arc::new(location);
        let (labels, body) = split_labels(&location.text);
        let (keyword, rest) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(keyword, rest)| (keyword, rest.trim()));

        // Labels of a line with a data value refer to the aligned value
        if self.section == Section::Data {
            match keyword {
                ".word" => self.align_data(4),
                ".half" => self.align_data(2),
                _ => {}
            }
        }
        for label in labels {
            let address = match self.section {
                Section::Text => self.text_address,
                Section::Data => self.data_address(),
            };
            if self.labels.insert(label.to_owned(), address).is_some() {
                self.report(
                    Severity::Error,
                    &location,
                    format!("label `{label}` is defined more than once"),
                );
            }
        }

        if keyword.is_empty() {
            return;
        }
        let result = if keyword.starts_with('.') {
            self.directive(keyword, rest, &location)
        } else {
            self.instruction(keyword, rest, &location)
        };
        if let Err(message) = result {
            self.report(Severity::Error, &location, message);
        }
    }

    fn instruction(
        &mut self,
        mnemonic: &str,
        operands: &str,
        location: &Arc<SourceLocation>,
    ) -> Result<(), String> {
        if self.section != Section::Text {
            return Err(format!("instruction `{mnemonic}` outside of the text section"));
        }
        let mut expanded = Vec::new();
        for operand in split_operands(operands)? {
            // `offset(base)` is shorthand for the operands `offset, base`
            let address = operand
                .strip_suffix(')')
                .and_then(|head| head.split_once('('))
                .filter(|_| !operand.starts_with('\''))
                .map(|(offset, base)| (offset.trim().to_owned(), base.trim().to_owned()));
            match address {
                Some((offset, base)) => {
                    expanded.push(if offset.is_empty() { "0".to_owned() } else { offset });
                    expanded.push(base);
                }
                None => expanded.push(operand),
            }
        }
        self.statements.push(PendingStatement {
            address: self.text_address,
            mnemonic: mnemonic.to_owned(),
            operands: expanded,
            location: Arc::clone(location),
        });
        self.text_address = self.text_address.wrapping_add(4);
        Ok(())
    }

    fn directive(
        &mut self,
        directive: &str,
        args: &str,
        location: &Arc<SourceLocation>,
    ) -> Result<(), String> {
        match directive {
            ".text" => self.section = Section::Text,
            ".data" => self.section = Section::Data,
            ".globl" | ".global" => {}
            ".word" | ".half" | ".byte" | ".asciz" | ".string" | ".ascii" | ".space"
            | ".align"
                if self.section == Section::Text =>
            {
                return Err(format!("directive `{directive}` outside of the data section"));
            }
            ".word" => {
                for value in split_operands(args)? {
                    match parse_integer(&value) {
                        Some(value) => self.push_value(value, 4)?,
                        None if is_identifier(&value) => {
                            self.fixups.push(Fixup {
                                offset: self.data.len(),
                                label: value,
                                location: Arc::clone(location),
                            });
                            self.data.extend_from_slice(&[0; 4]);
                        }
                        None => return Err(format!("invalid value `{value}`")),
                    }
                }
            }
            ".half" | ".byte" => {
                let size = if directive == ".half" { 2 } else { 1 };
                for value in split_operands(args)? {
                    let parsed =
                        parse_integer(&value).ok_or_else(|| format!("invalid value `{value}`"))?;
                    self.push_value(parsed, size)?;
                }
            }
            ".asciz" | ".string" | ".ascii" => {
                for value in split_operands(args)? {
                    let bytes = parse_string(&value)
                        .ok_or_else(|| format!("invalid string literal {value}"))?;
                    self.data.extend_from_slice(&bytes);
                    if directive != ".ascii" {
                        self.data.push(0);
                    }
                }
            }
            ".space" => {
                let size = parse_integer(args)
                    .and_then(|size| usize::try_from(size).ok())
                    .ok_or_else(|| format!("invalid size `{args}`"))?;
                let available =
                    (u64::from(self.data_end) + 1).saturating_sub(u64::from(self.data_address()));
                if size as u64 > available {
                    return Err(format!("`.space {size}` does not fit in the data region"));
                }
                self.data.resize(self.data.len() + size, 0);
            }
            ".align" => {
                let exponent = parse_integer(args)
                    .filter(|exponent| (0..=12).contains(exponent))
                    .ok_or_else(|| format!("invalid alignment `{args}`"))?;
                self.align_data(1 << exponent);
            }
            _ => self.report(
                Severity::Warning,
                location,
                format!("unsupported directive `{directive}` is ignored"),
            ),
        }
        Ok(())
    }

    fn push_value(&mut self, value: i64, size: usize) -> Result<(), String> {
        let bits = 8 * size as u32;
        if value < -(1 << (bits - 1)) || value >= 1 << bits {
            return Err(format!("value {value} does not fit in {size} byte(s)"));
        }
        self.data
            .extend_from_slice(&(value as u32).to_le_bytes()[..size]);
        Ok(())
    }

    /// Second pass: resolves labels and encodes the statements.
    fn finish(
        mut self,
        instruction_set: &InstructionSet,
    ) -> Result<(ProgramImage, AssemblyErrors), AssemblyErrors> {
        let csrs = CsrFile::user_level();
        let mut image = ProgramImage::new();

        for fixup in std::mem::take(&mut self.fixups) {
            match self.labels.get(&fixup.label) {
                Some(address) => {
                    self.data[fixup.offset..fixup.offset + 4]
                        .copy_from_slice(&address.to_le_bytes());
                }
                None => self.report(
                    Severity::Error,
                    &fixup.location,
                    format!("undefined label `{}`", fixup.label),
                ),
            }
        }

        for statement in std::mem::take(&mut self.statements) {
            let encoded = instruction_set
                .by_mnemonic(&statement.mnemonic)
                .ok_or_else(|| format!("unknown instruction `{}`", statement.mnemonic))
                .and_then(|instruction| self.encode(instruction, &csrs, &statement));
            match encoded {
                Ok(raw) => image.push_statement(
                    ProgramStatement::new(statement.address, raw).with_source(statement.location),
                ),
                Err(message) => self.report(Severity::Error, &statement.location, message),
            }
        }

        if !self.data.is_empty() {
            image.push_data(self.data_base, std::mem::take(&mut self.data));
        }

        debug!(
            statements = image.statements().len(),
            labels = self.labels.len(),
            errors = self.diagnostics.error_count(),
            warnings = self.diagnostics.warning_count();
            "Assembled program"
        );
        if self.diagnostics.has_errors() {
            Err(self.diagnostics)
        } else {
            Ok((image, self.diagnostics))
        }
    }

    fn encode(
        &self,
        instruction: &Instruction,
        csrs: &CsrFile,
        statement: &PendingStatement,
    ) -> Result<u32, String> {
        let fields = instruction.template().fields();
        if fields.len() != statement.operands.len() {
            return Err(format!(
                "`{}` expects {} operand(s) but got {}, e.g. `{}`",
                instruction.mnemonic(),
                fields.len(),
                statement.operands.len(),
                instruction.example()
            ));
        }
        let is_csr_format = matches!(instruction.format(), Format::Csr | Format::CsrImm);
        let mut values = Vec::with_capacity(fields.len());
        for (index, (field, operand)) in fields.iter().zip(&statement.operands).enumerate() {
            let value = match field.kind() {
                OperandKind::Register => Specifier::from_name(operand)
                    .map(|register| u8::from(register) as i32)
                    .ok_or_else(|| format!("`{operand}` is not a register"))?,
                OperandKind::Immediate(Immediate::Branch | Immediate::Jump) => {
                    match parse_integer(operand) {
                        Some(offset) => to_i32(offset)?,
                        None => {
                            let target = self.label(operand)?;
                            target.wrapping_sub(statement.address) as i32
                        }
                    }
                }
                OperandKind::Immediate(_) => match parse_integer(operand) {
                    Some(value) => to_i32(value)?,
                    None if is_csr_format && index == 1 => csrs
                        .specifier_of(operand)
                        .map(i32::from)
                        .ok_or_else(|| format!("unknown CSR `{operand}`"))?,
                    None => self.label(operand)? as i32,
                },
            };
            values.push(value);
        }
        instruction
            .encode(&values)
            .map_err(|err| format!("cannot encode `{}`: {err}", instruction.mnemonic()))
    }

    fn label(&self, operand: &str) -> Result<u32, String> {
        if !is_identifier(operand) {
            return Err(format!("invalid operand `{operand}`"));
        }
        self.labels
            .get(operand)
            .copied()
            .ok_or_else(|| format!("undefined label `{operand}`"))
    }
}

/// Immediates may be written as signed or as unsigned 32-bit values.
fn to_i32(value: i64) -> Result<i32, String> {
    i32::try_from(value)
        .or_else(|_| u32::try_from(value).map(|value| value as i32))
        .map_err(|_| format!("value {value} does not fit in 32 bits"))
}

fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '#' => return &line[..index],
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }
    line
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Splits `name: name: rest` into the label names and the rest of the line.
fn split_labels(mut text: &str) -> (Vec<&str>, &str) {
    let mut labels = Vec::new();
    while let Some((head, rest)) = text.split_once(':') {
        let head = head.trim();
        if !is_identifier(head) {
            break;
        }
        labels.push(head);
        text = rest.trim_start();
    }
    (labels, text.trim())
}

/// Splits comma-separated operands, leaving commas inside quotes alone.
fn split_operands(text: &str) -> Result<Vec<String>, String> {
    let mut operands = Vec::new();
    let mut current = String::new();
    let mut quote = None;
    let mut escaped = false;
    for c in text.chars() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == ',' => {
                operands.push(std::mem::take(&mut current).trim().to_owned());
                continue;
            }
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
        current.push(c);
    }
    if quote.is_some() {
        return Err("unterminated quote".to_owned());
    }
    let last = current.trim();
    if !last.is_empty() || !operands.is_empty() {
        operands.push(last.to_owned());
    }
    if operands.iter().any(String::is_empty) {
        return Err("missing operand".to_owned());
    }
    Ok(operands)
}

fn unescape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' | '\'' | '"' => c,
        _ => return None,
    })
}

/// Parses the contents of a quoted literal, resolving escape sequences.
fn parse_quoted(text: &str, quote: char) -> Option<String> {
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        result.push(if c == '\\' { unescape(chars.next()?)? } else { c });
    }
    Some(result)
}

fn parse_string(text: &str) -> Option<Vec<u8>> {
    parse_quoted(text, '"').map(String::into_bytes)
}

/// Parses decimal, `0x` hexadecimal and `0b` binary integers, and character literals.
fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.starts_with('\'') {
        let literal = parse_quoted(text, '\'')?;
        let mut chars = literal.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c as i64),
            _ => None,
        };
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(binary) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        i64::from_str_radix(binary, 2).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()?
    } else {
        return None;
    };
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(source: &str) -> Result<(ProgramImage, AssemblyErrors), AssemblyErrors> {
        BasicAssembler::new().assemble(
            &InstructionSet::standard(),
            &MemoryConfig::default(),
            &[SourceFile::new("test.s", source)],
        )
    }

    fn words(image: &ProgramImage) -> Vec<u32> {
        image.statements().iter().map(ProgramStatement::raw).collect()
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(Some(42), parse_integer("42"));
        assert_eq!(Some(-100), parse_integer("-100"));
        assert_eq!(Some(0xFF), parse_integer("0xFF"));
        assert_eq!(Some(-5), parse_integer("-0b101"));
        assert_eq!(Some(b'a' as i64), parse_integer("'a'"));
        assert_eq!(Some(10), parse_integer("'\\n'"));
        assert_eq!(None, parse_integer("label"));
        assert_eq!(None, parse_integer("0xZZ"));
        assert_eq!(None, parse_integer("'ab'"));
    }

    #[test]
    fn test_helpers() {
        assert_eq!("addi t0, t0, '#'  ", strip_comment("addi t0, t0, '#'  # comment"));
        assert_eq!((vec!["a", "b"], "nop x"), split_labels("a: b:nop x"));
        assert_eq!((vec![], ".asciz \"a:b\""), split_labels(".asciz \"a:b\""));
        assert_eq!(
            Ok(vec!["\"a,b\"".to_owned(), "','".to_owned()]),
            split_operands("\"a,b\", ','")
        );
        assert_eq!(Ok(vec![]), split_operands(""));
        assert!(split_operands("a,,b").is_err());
        assert_eq!(Some(b"a\n\"".to_vec()), parse_string("\"a\\n\\\"\""));
    }

    #[test]
    fn test_instructions() {
        let (image, warnings) = assemble(
            "
            start:  addi t0, zero, 10    # comment
                    lw   t1, -4(sp)
                    sw   t1, (sp)
                    beq  t0, t1, start
                    jal  ra, end
                    csrrs t2, cycle, zero
            end:    ecall
            ",
        )
        .unwrap();
        assert_eq!(0, warnings.warning_count());
        let set = InstructionSet::standard();
        let encode = |mnemonic: &str, operands: &[i32]| set.encode(mnemonic, operands).unwrap();
        assert_eq!(
            vec![
                0x00A0_0293,
                encode("lw", &[6, -4, 2]),
                encode("sw", &[6, 0, 2]),
                encode("beq", &[5, 6, -12]),
                encode("jal", &[1, 8]),
                encode("csrrs", &[7, 0xC00, 0]),
                0x0000_0073,
            ],
            words(&image)
        );
        let statement = &image.statements()[1];
        assert_eq!(0x0040_0004, statement.address());
        assert_eq!(Some(3), statement.line());
        assert_eq!("lw   t1, -4(sp)", statement.source().unwrap().text);
        assert_eq!(Some(0x0040_001C), image.text_end());
    }

    #[test]
    fn test_data() {
        let (image, _) = assemble(
            "
            .data
            bytes:  .byte 1, -1, 'A'
            word:   .word 0x12345678, word
            .half 0xFFFF
            str:    .asciz \"hi\"
            .align 2
            end:    .space 3
            .text
            lui t0, 0x10010
            ",
        )
        .unwrap();
        let data = &image.data()[0];
        assert_eq!(0x1001_0000, data.address());
        assert_eq!(
            &[
                1, 0xFF, b'A', 0, // bytes, padding
                0x78, 0x56, 0x34, 0x12, // word
                0x04, 0x00, 0x01, 0x10, // address of word
                0xFF, 0xFF, b'h', b'i', 0, 0, 0, 0, // half, str, align
                0, 0, 0, // space
            ][..],
            data.bytes()
        );
    }

    #[test]
    fn test_errors() {
        let errors = assemble(
            "
            addi t0, zero
            foo t0, t1
            addi t0, zero, 4096
            beq t0, t1, nowhere
            csrrwi t0, 10, 0xFF
            dup: dup: addi t0, t0, 1
            .word 1
            .data
            add t0, t0, t0
            .half 70000
            .weird
            ",
        )
        .unwrap_err();
        let lines: Vec<usize> = errors
            .messages()
            .iter()
            .filter(|message| message.severity == Severity::Error)
            .map(|message| message.line)
            .collect();
        assert_eq!(9, errors.error_count());
        assert_eq!(1, errors.warning_count());
        for line in [2, 3, 4, 5, 6, 7, 8, 10, 11] {
            assert!(lines.contains(&line), "no error on line {line}");
        }
        let warning = errors
            .messages()
            .iter()
            .find(|message| message.severity == Severity::Warning);
        assert_eq!(Some(12), warning.map(|message| message.line));
        assert!(errors
            .messages()
            .iter()
            .any(|message| message.message.contains("expects 3 operand(s)")));
    }

    #[test]
    fn test_space_exceeding_data_region() {
        let errors = assemble(".data\n.space 4000000000\n").unwrap_err();
        assert_eq!(1, errors.error_count());
        assert_eq!(2, errors.messages()[0].line);
        assert!(errors.messages()[0]
            .message
            .contains("does not fit in the data region"));
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let (image, warnings) = assemble(".section .rodata\n.text\necall\n").unwrap();
        assert_eq!(1, warnings.warning_count());
        assert_eq!(1, image.statements().len());
    }
}
