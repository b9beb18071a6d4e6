//! Provides a simulatable RV32IM core with the Zicsr extension and user-level traps.

pub mod counters;
mod execute;
pub mod memory;
pub mod trap;

use crate::cs_registers::CsrFile;
use crate::environment::Environment;
use crate::format::Operands;
use crate::instruction::{InstructionId, InstructionSet};
use crate::program::{ProgramImage, ProgramStatement, SetupError};
use crate::registers::{Registers, Specifier};
use crate::PrivilegeLevel;
use log::{debug, trace, warn};
use memory::{Memory, MemoryConfig, MemoryError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trap::{Fault, Trap};

pub use execute::{CsrOp, CsrSource, Executor};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// If `true`, non-naturally-aligned memory accesses are supported.
    /// If `false`, they will generate an address-misaligned exception.
    pub support_misaligned_memory_access: bool,
    /// If `true`, stores into the text region are allowed, and the modified words are decoded anew
    /// when executed.
    pub self_modifying_code: bool,
    /// Privilege level programs run at. Governs CSR access and the kind of environment call.
    pub privilege_level: PrivilegeLevel,
    pub memory: MemoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            support_misaligned_memory_access: false,
            self_modifying_code: false,
            privilege_level: PrivilegeLevel::User,
            memory: MemoryConfig::default(),
        }
    }
}

/// What happened after a statement executed without a trap.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// Proceed with the statement at the (updated) `pc`.
    Continue,
    /// The program asked to terminate with an exit code.
    Exit(i32),
    /// An `ebreak` was executed.
    Breakpoint,
}

/// Result of executing the semantics of a single instruction.
pub type ExecutionResult = Result<Outcome, Trap>;

#[derive(Debug, Copy, Clone)]
struct Decoded {
    raw: u32,
    id: InstructionId,
    operands: Operands,
}

/// RISC-V core with a single hart, running one program.
///
/// > A component is termed a core if it contains an independent instruction fetch unit.
/// > A RISC-V-compatible core might support multiple RISC-V-compatible hardware threads, or harts,
/// > through multithreading.
///
/// Statements are decoded on their first fetch and the result is kept per address, together with
/// the word it was decoded from. A word that changed since (self-modifying code) is decoded again.
#[derive(Debug, Clone)]
pub struct Core {
    config: Config,
    instruction_set: Arc<InstructionSet>,
    registers: Registers,
    csrs: CsrFile,
    memory: Memory,
    environment: Environment,
    statements: HashMap<u32, ProgramStatement>,
    decoded: HashMap<u32, Decoded>,
    text_end: Option<u32>,
}

impl Core {
    pub fn new(instruction_set: Arc<InstructionSet>, config: Config) -> Self {
        let memory = Memory::new(
            &config.memory,
            config.self_modifying_code,
            config.support_misaligned_memory_access,
        );
        let mut registers = Registers::new(config.memory.text.start());
        registers.set_x(Specifier::SP, config.memory.stack_pointer);
        registers.set_x(Specifier::GP, config.memory.global_pointer);
        Self {
            environment: Environment::new(config.memory.heap_base),
            config,
            instruction_set,
            registers,
            csrs: CsrFile::user_level(),
            memory,
            statements: HashMap::new(),
            decoded: HashMap::new(),
            text_end: None,
        }
    }

    /// Provide a read-only view of this core's configuration.
    ///
    /// It is not possible to modify the configuration after creation.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn instruction_set(&self) -> &Arc<InstructionSet> {
        &self.instruction_set
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn csrs(&self) -> &CsrFile {
        &self.csrs
    }

    pub fn csrs_mut(&mut self) -> &mut CsrFile {
        &mut self.csrs
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    /// Address right after the last loaded statement. Reaching it ends the program.
    pub fn text_end(&self) -> Option<u32> {
        self.text_end
    }

    /// The loaded statement at `address`, with its source information.
    pub fn statement_at(&self, address: u32) -> Option<&ProgramStatement> {
        self.statements.get(&address)
    }

    /// Loads a program image and points the `pc` at its entry.
    pub fn load(&mut self, image: &ProgramImage) -> Result<(), SetupError> {
        for statement in image.statements() {
            let address = statement.address();
            self.memory
                .load(address, &statement.raw().to_le_bytes())
                .map_err(|source| SetupError::Load { address, source })?;
            self.statements.insert(address, statement.clone());
        }
        for segment in image.data() {
            self.memory
                .load(segment.address(), segment.bytes())
                .map_err(|source| SetupError::Load {
                    address: segment.address(),
                    source,
                })?;
        }
        let entry = image.entry().unwrap_or(self.config.memory.text.start());
        *self.registers.pc_mut() = entry;
        self.text_end = image.text_end();
        self.decoded.clear();
        debug!(
            entry = entry,
            statements = image.statements().len(),
            segments = image.data().len();
            "Loaded program image"
        );
        Ok(())
    }

    /// Places program arguments on the stack.
    ///
    /// The strings are stored below the initial stack pointer, followed by a null-terminated array
    /// of pointers to them. Afterwards `a0` holds the argument count, `a1` the address of the
    /// pointer array, and `sp` points to the word below that array.
    pub fn push_arguments<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), SetupError> {
        if args.is_empty() {
            return Ok(());
        }
        let mut address = self.registers.x(Specifier::SP);
        let mut pointers = Vec::with_capacity(args.len() + 1);
        for arg in args {
            let bytes = arg.as_ref().as_bytes();
            address = u32::try_from(bytes.len() + 1)
                .ok()
                .and_then(|size| address.checked_sub(size))
                .ok_or(SetupError::ArgumentsTooLarge)?;
            self.load_bytes(address, bytes)?;
            self.load_bytes(address + bytes.len() as u32, &[0])?;
            pointers.push(address);
        }
        pointers.push(0);

        let size = 4 * pointers.len() as u32;
        let argv = (address & !0b11)
            .checked_sub(size)
            .ok_or(SetupError::ArgumentsTooLarge)?;
        for (index, pointer) in pointers.iter().enumerate() {
            self.load_bytes(argv + 4 * index as u32, &pointer.to_le_bytes())?;
        }
        self.registers.set_x(Specifier::A0, args.len() as u32);
        self.registers.set_x(Specifier::A1, argv);
        self.registers.set_x(Specifier::SP, argv - 4);
        Ok(())
    }

    fn load_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<(), SetupError> {
        self.memory
            .load(address, bytes)
            .map_err(|source| SetupError::Load { address, source })
    }

    /// Fetches the statement at the current `pc`.
    ///
    /// If memory still holds the word that was loaded there, the loaded statement (with its source
    /// information) is returned. Otherwise a bare statement is built from the current word.
    pub fn fetch(&self) -> Result<ProgramStatement, Fault> {
        let address = self.registers.pc();
        let raw = self.memory.fetch(address).map_err(|err| {
            let exception = match err {
                MemoryError::MisalignedAccess => Exception::InstructionAddressMisaligned,
                MemoryError::AccessFault | MemoryError::TextWrite => {
                    Exception::InstructionAccessFault
                }
            };
            Fault::new(
                ProgramStatement::new(address, 0),
                Trap::new(exception, address, format!("cannot fetch instruction: {err}")),
            )
        })?;
        match self.statements.get(&address) {
            Some(statement) if statement.raw() == raw => Ok(statement.clone()),
            Some(_) => {
                warn!("Executing modified statement at {address:#010x}, which has no source line");
                Ok(ProgramStatement::new(address, raw))
            }
            None => Ok(ProgramStatement::new(address, raw)),
        }
    }

    /// Executes a single statement as if it was located at its address.
    ///
    /// The statement is resolved to an instruction of the instruction set and its semantics are
    /// invoked. If those raise a trap, the statement is attached to form a [`Fault`]. Semantics
    /// never commit state after raising a trap.
    pub fn execute(&mut self, statement: &ProgramStatement) -> Result<Outcome, Fault> {
        let (id, operands) = self
            .decode(statement.address(), statement.raw())
            .map_err(|trap| Fault::new(statement.clone(), trap))?;
        let instruction = self.instruction_set.get(id);
        trace!(
            "Executing {:#010x} ({:#010x}): {}",
            statement.address(),
            statement.raw(),
            instruction.disassemble(&operands)
        );

        *self.registers.pc_mut() = statement.address();
        let mut executor = Executor {
            raw: statement.raw(),
            privilege_level: self.config.privilege_level,
            registers: &mut self.registers,
            csrs: &mut self.csrs,
            memory: &mut self.memory,
            environment: &mut self.environment,
        };
        (instruction.semantics())(&mut executor, &operands)
            .map_err(|trap| Fault::new(statement.clone(), trap))
    }

    /// Fetches and executes the next statement, then advances the counters.
    ///
    /// A fault is delivered to the user trap handler if one is installed, in which case this
    /// returns [`Outcome::Continue`] with the `pc` at the handler. Otherwise the fault is returned
    /// and no state is changed beyond what happened before the faulting operation.
    pub fn step(&mut self) -> Result<Outcome, Fault> {
        let result = self.fetch().and_then(|statement| self.execute(&statement));
        self.csrs.counters_mut().increment_cycle();
        match result {
            Ok(outcome) => {
                self.csrs.counters_mut().increment_instret();
                Ok(outcome)
            }
            Err(fault) => {
                if trap::enter_handler(&mut self.csrs, &mut self.registers, &fault) {
                    Ok(Outcome::Continue)
                } else {
                    Err(fault)
                }
            }
        }
    }

    /// Resolves a word to an instruction, using the decode cache.
    fn decode(&mut self, address: u32, raw: u32) -> Result<(InstructionId, Operands), Trap> {
        if let Some(decoded) = self.decoded.get(&address) {
            if decoded.raw == raw {
                return Ok((decoded.id, decoded.operands));
            }
            debug!("Decoding modified statement at {address:#010x}");
        }
        let id = self.instruction_set.resolve(raw).ok_or_else(|| {
            Trap::illegal_instruction(raw, format!("unknown instruction encoding {raw:#010x}"))
        })?;
        let operands = self.instruction_set.get(id).decode(raw);
        self.decoded.insert(address, Decoded { raw, id, operands });
        Ok((id, operands))
    }
}

/// Synchronous exceptions, with the exception codes written to `ucause`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Exception {
    /// Instruction address is not on a four-byte aligned boundary in memory.
    InstructionAddressMisaligned,
    /// Instruction fetch outside of the text region.
    InstructionAccessFault,
    /// Generic exception used to communicate one of many possible scenarios:
    ///
    /// - Attempt to decode a word that matches no registered instruction.
    /// - Attempt to access a non-existent CSR.
    /// - Attempt to access a CSR without the appropriate privilege level.
    /// - Attempt to write to a read-only CSR.
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    StoreOrAmoAddressMisaligned,
    StoreOrAmoAccessFault,
    EnvironmentCallFromUMode,
    EnvironmentCallFromSMode,
    EnvironmentCallFromMMode,
}

impl Exception {
    /// Returns the exception code (cause) for this exception.
    pub fn code(&self) -> u32 {
        match self {
            Self::InstructionAddressMisaligned => 0,
            Self::InstructionAccessFault => 1,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            Self::LoadAddressMisaligned => 4,
            Self::LoadAccessFault => 5,
            Self::StoreOrAmoAddressMisaligned => 6,
            Self::StoreOrAmoAccessFault => 7,
            Self::EnvironmentCallFromUMode => 8,
            Self::EnvironmentCallFromSMode => 9,
            Self::EnvironmentCallFromMMode => 11,
        }
    }

    /// The environment-call exception raised from `privilege_level`.
    pub fn environment_call(privilege_level: PrivilegeLevel) -> Self {
        match privilege_level {
            PrivilegeLevel::User => Self::EnvironmentCallFromUMode,
            PrivilegeLevel::Supervisor => Self::EnvironmentCallFromSMode,
            PrivilegeLevel::Machine => Self::EnvironmentCallFromMMode,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstructionAddressMisaligned => "instruction address misaligned",
            Self::InstructionAccessFault => "instruction access fault",
            Self::IllegalInstruction => "illegal instruction",
            Self::Breakpoint => "breakpoint",
            Self::LoadAddressMisaligned => "load address misaligned",
            Self::LoadAccessFault => "load access fault",
            Self::StoreOrAmoAddressMisaligned => "store address misaligned",
            Self::StoreOrAmoAccessFault => "store access fault",
            Self::EnvironmentCallFromUMode => "environment call from U-mode",
            Self::EnvironmentCallFromSMode => "environment call from S-mode",
            Self::EnvironmentCallFromMMode => "environment call from M-mode",
        })
    }
}
