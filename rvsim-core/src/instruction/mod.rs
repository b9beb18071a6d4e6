//! Instruction definitions and the registry that decodes words into them.
//!
//! Every instruction is described by an [`InstructionDef`]: a mnemonic, a bit template in one of
//! the [`Format`]s, and a semantic function. An [`InstructionSet`] holds the parsed definitions and
//! guarantees that no 32-bit word matches more than one of them.

mod base;
mod csr;
mod mul;

use crate::core::{ExecutionResult, Executor};
use crate::format::{EncodeError, Format, OperandKind, Operands, Template, TemplateError};
use crate::registers::Specifier;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The semantics of an instruction, invoked with its decoded operands.
pub type Semantics = fn(&mut Executor<'_>, &Operands) -> ExecutionResult;

/// Static description of a single instruction.
#[derive(Clone, Copy)]
pub struct InstructionDef {
    pub mnemonic: &'static str,
    pub format: Format,
    /// Bit template, most significant bit first. See [`Template::parse`].
    pub template: &'static str,
    /// Example use in assembly, e.g. `addi t1, t2, -100`.
    pub example: &'static str,
    pub description: &'static str,
    pub semantics: Semantics,
}

impl InstructionDef {
    pub const fn new(
        mnemonic: &'static str,
        format: Format,
        template: &'static str,
        example: &'static str,
        description: &'static str,
        semantics: Semantics,
    ) -> Self {
        Self {
            mnemonic,
            format,
            template,
            example,
            description,
            semantics,
        }
    }
}

impl fmt::Debug for InstructionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionDef")
            .field("mnemonic", &self.mnemonic)
            .field("format", &self.format)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

/// A registered instruction: its definition together with the parsed template.
#[derive(Debug, Clone)]
pub struct Instruction {
    def: InstructionDef,
    template: Template,
}

impl Instruction {
    pub fn new(def: InstructionDef) -> Result<Self, TemplateError> {
        let template = Template::parse(def.template, def.format)?;
        Ok(Self { def, template })
    }

    pub fn mnemonic(&self) -> &'static str {
        self.def.mnemonic
    }

    pub fn format(&self) -> Format {
        self.def.format
    }

    pub fn example(&self) -> &'static str {
        self.def.example
    }

    pub fn description(&self) -> &'static str {
        self.def.description
    }

    pub fn semantics(&self) -> Semantics {
        self.def.semantics
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn decode(&self, raw: u32) -> Operands {
        self.template.decode(raw)
    }

    pub fn encode(&self, operands: &[i32]) -> Result<u32, EncodeError> {
        self.template.encode(operands)
    }

    /// Renders decoded operands in assembly syntax, e.g. `addi x6, x7, -100`.
    pub fn disassemble<'a>(&'a self, operands: &'a Operands) -> Disassembly<'a> {
        Disassembly {
            instruction: self,
            operands,
        }
    }
}

/// Displays an instruction with its operands. See [`Instruction::disassemble`].
#[derive(Debug)]
pub struct Disassembly<'a> {
    instruction: &'a Instruction,
    operands: &'a Operands,
}

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction.mnemonic())?;
        let fields = self.instruction.template.fields();
        for (index, (field, &value)) in fields.iter().zip(self.operands.as_slice()).enumerate() {
            f.write_str(if index == 0 { " " } else { ", " })?;
            match field.kind() {
                OperandKind::Register => write!(f, "{}", Specifier::from_u5(value as u8 & 0x1F))?,
                OperandKind::Immediate(_) => write!(f, "{value}")?,
            }
        }
        Ok(())
    }
}

/// Identifies an instruction within the [`InstructionSet`] it was registered in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InstructionId(usize);

/// A set of instructions in which every 32-bit word matches at most one instruction.
///
/// Instructions are bucketed by their (always fully fixed) opcode, so resolving a word only
/// compares it against the instructions that share its opcode.
#[derive(Debug, Clone)]
pub struct InstructionSet {
    instructions: Vec<Instruction>,
    by_opcode: Vec<Vec<InstructionId>>,
    by_mnemonic: HashMap<&'static str, InstructionId>,
}

impl Default for InstructionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl InstructionSet {
    /// Creates an empty instruction set.
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            by_opcode: vec![Vec::new(); 128],
            by_mnemonic: HashMap::new(),
        }
    }

    /// Creates an instruction set holding all of `defs`, or reports the first one that cannot be
    /// registered.
    pub fn from_defs<'a, I>(defs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'a InstructionDef>,
    {
        let mut set = Self::new();
        for def in defs {
            set.register(*def)?;
        }
        Ok(set)
    }

    /// The RV32I base, RV32M and Zicsr instructions, plus `uret`.
    ///
    /// # Panics
    ///
    /// Panics if the built-in catalog is malformed, which is a programming error.
    pub fn standard() -> Self {
        let defs = base::INSTRUCTIONS
            .iter()
            .chain(mul::INSTRUCTIONS)
            .chain(csr::INSTRUCTIONS);
        match Self::from_defs(defs) {
            Ok(set) => set,
            Err(err) => panic!("malformed built-in instruction catalog: {err}"),
        }
    }

    /// Adds an instruction.
    ///
    /// Fails without modifying the set if the template is malformed, the mnemonic is taken, or the
    /// template collides with an already registered one.
    pub fn register(&mut self, def: InstructionDef) -> Result<InstructionId, RegistryError> {
        let instruction = Instruction::new(def).map_err(|source| RegistryError::Template {
            mnemonic: def.mnemonic,
            source,
        })?;
        if self.by_mnemonic.contains_key(def.mnemonic) {
            return Err(RegistryError::DuplicateMnemonic(def.mnemonic));
        }
        let opcode = instruction.template.opcode() as usize;
        if let Some(existing) = self.by_opcode[opcode]
            .iter()
            .map(|&id| self.get(id))
            .find(|existing| existing.template.collides_with(&instruction.template))
        {
            return Err(RegistryError::Collision {
                mnemonic: def.mnemonic,
                existing: existing.mnemonic(),
            });
        }

        let id = InstructionId(self.instructions.len());
        debug!(
            mnemonic = def.mnemonic,
            mask = instruction.template.mask(),
            value = instruction.template.value();
            "Registered instruction"
        );
        self.instructions.push(instruction);
        self.by_opcode[opcode].push(id);
        self.by_mnemonic.insert(def.mnemonic, id);
        Ok(id)
    }

    /// Finds the instruction matching `raw`, or `None` if there is no such instruction.
    pub fn resolve(&self, raw: u32) -> Option<InstructionId> {
        self.by_opcode[(raw & 0x7F) as usize]
            .iter()
            .copied()
            .find(|&id| self.get(id).template.matches(raw))
    }

    /// Returns the instruction with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this set.
    pub fn get(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id.0]
    }

    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&Instruction> {
        self.by_mnemonic.get(mnemonic).map(|&id| self.get(id))
    }

    /// Encodes an instruction from its mnemonic and operands in assembly order.
    pub fn encode(&self, mnemonic: &str, operands: &[i32]) -> Result<u32, RegistryError> {
        let instruction = self
            .by_mnemonic(mnemonic)
            .ok_or_else(|| RegistryError::UnknownMnemonic(mnemonic.to_owned()))?;
        instruction
            .encode(operands)
            .map_err(|source| RegistryError::Encode {
                mnemonic: instruction.mnemonic(),
                source,
            })
    }

    /// Decodes and disassembles `raw`, if it is a known instruction.
    pub fn disassemble(&self, raw: u32) -> Option<String> {
        let instruction = self.get(self.resolve(raw)?);
        let operands = instruction.decode(raw);
        Some(instruction.disassemble(&operands).to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum RegistryError {
    #[error("invalid template for `{mnemonic}`: {source}")]
    Template {
        mnemonic: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("`{0}` is already registered")]
    DuplicateMnemonic(&'static str),
    #[error("template of `{mnemonic}` collides with `{existing}`")]
    Collision {
        mnemonic: &'static str,
        existing: &'static str,
    },
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("cannot encode `{mnemonic}`: {source}")]
    Encode {
        mnemonic: &'static str,
        #[source]
        source: EncodeError,
    },
}
