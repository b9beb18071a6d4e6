//! Assembled programs and the entry points to run them.
//!
//! An [`Assembler`] turns source files into a [`ProgramImage`]: the statements of the text
//! section, each with its encoding and source location, plus the initial contents of data memory.
//! A [`Program`] ties an image to an [`InstructionSet`] and a [`Simulator`], and exposes the
//! assemble, setup and simulate steps to embedding applications.

use crate::core::memory::{MemoryConfig, MemoryError};
use crate::core::trap::Fault;
use crate::core::{Config, Core};
use crate::instruction::InstructionSet;
use crate::simulator::{Reason, Simulator, StopHandle};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Where a statement came from in the assembly source.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceLocation {
    pub file: String,
    /// One-based line number.
    pub line: usize,
    /// The source text of the line, without comments.
    pub text: String,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One assembled statement of the text section.
///
/// Statements are immutable. When self-modifying code overwrites a statement in memory, the core
/// fetches a new statement built from the word in memory, without source information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramStatement {
    address: u32,
    raw: u32,
    source: Option<Arc<SourceLocation>>,
}

impl ProgramStatement {
    pub fn new(address: u32, raw: u32) -> Self {
        Self {
            address,
            raw,
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<SourceLocation>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// The 32-bit encoding of this statement.
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_deref()
    }

    /// The source line number, if known.
    pub fn line(&self) -> Option<usize> {
        self.source.as_ref().map(|source| source.line)
    }
}

impl fmt::Display for ProgramStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.address)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

/// Initial contents of a span of memory outside the text statements.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DataSegment {
    address: u32,
    bytes: Vec<u8>,
}

impl DataSegment {
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Everything needed to put a program into memory.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProgramImage {
    entry: Option<u32>,
    statements: Vec<ProgramStatement>,
    data: Vec<DataSegment>,
}

impl ProgramImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start execution at `entry` instead of the start of the text region.
    pub fn with_entry(mut self, entry: u32) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn push_statement(&mut self, statement: ProgramStatement) {
        self.statements.push(statement);
    }

    pub fn push_data(&mut self, address: u32, bytes: impl Into<Vec<u8>>) {
        self.data.push(DataSegment {
            address,
            bytes: bytes.into(),
        });
    }

    pub fn entry(&self) -> Option<u32> {
        self.entry
    }

    pub fn statements(&self) -> &[ProgramStatement] {
        &self.statements
    }

    pub fn data(&self) -> &[DataSegment] {
        &self.data
    }

    /// The address right after the last statement, or `None` without statements.
    pub fn text_end(&self) -> Option<u32> {
        self.statements
            .iter()
            .map(|statement| statement.address().wrapping_add(4))
            .max()
    }
}

/// A named source file handed to an [`Assembler`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Turns source files into a program image for a given instruction set.
pub trait Assembler {
    /// On success, returns the image along with any warnings. On failure, the returned
    /// diagnostics contain at least one error.
    fn assemble(
        &self,
        instruction_set: &InstructionSet,
        memory: &MemoryConfig,
        files: &[SourceFile],
    ) -> Result<(ProgramImage, AssemblyErrors), AssemblyErrors>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A single assembler diagnostic.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ErrorMessage {
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.file, self.line, self.severity, self.message
        )
    }
}

/// The diagnostics of an assembly pass.
#[derive(Error, Debug, Clone, Default, Eq, PartialEq)]
#[error("{} error(s) and {} warning(s) during assembly", self.error_count(), self.warning_count())]
pub struct AssemblyErrors {
    messages: Vec<ErrorMessage>,
}

impl AssemblyErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ErrorMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ErrorMessage] {
        &self.messages
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.messages
            .iter()
            .filter(|message| message.severity == severity)
            .count()
    }
}

/// Errors while preparing a program for simulation.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum SetupError {
    #[error("no program has been assembled or loaded")]
    NotLoaded,
    #[error("the program has not been set up for simulation")]
    NotSetUp,
    #[error("cannot load program at {address:#010x}")]
    Load {
        address: u32,
        #[source]
        source: MemoryError,
    },
    #[error("program arguments do not fit on the stack")]
    ArgumentsTooLarge,
}

/// Options for running a [`Program`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Options {
    pub core: Config,
    /// Stop with [`Reason::StepLimit`] after this many statements.
    pub max_steps: Option<u64>,
}

/// A program, from assembly to the end of its simulation.
///
/// ```text
/// assemble/load --> setup --> simulate/step --> exit_code, stdout, stderr, fault
/// ```
///
/// Calling [`setup`](Self::setup) again starts over from the assembled image.
#[derive(Debug)]
pub struct Program {
    instruction_set: Arc<InstructionSet>,
    options: Options,
    image: Option<ProgramImage>,
    simulator: Option<Simulator>,
}

impl Program {
    /// A program using the standard RV32IM + Zicsr instruction set.
    pub fn new(options: Options) -> Self {
        Self::with_instruction_set(Arc::new(InstructionSet::standard()), options)
    }

    pub fn with_instruction_set(instruction_set: Arc<InstructionSet>, options: Options) -> Self {
        Self {
            instruction_set,
            options,
            image: None,
            simulator: None,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn instruction_set(&self) -> &Arc<InstructionSet> {
        &self.instruction_set
    }

    /// Assembles `files`, replacing any previously loaded image. Returns the warnings on success.
    pub fn assemble<A: Assembler>(
        &mut self,
        assembler: &A,
        files: &[SourceFile],
    ) -> Result<AssemblyErrors, AssemblyErrors> {
        let (image, warnings) =
            assembler.assemble(&self.instruction_set, &self.options.core.memory, files)?;
        for warning in warnings.messages() {
            warn!("{warning}");
        }
        self.load(image);
        Ok(warnings)
    }

    /// Uses an image produced elsewhere, e.g. read from an ELF file.
    pub fn load(&mut self, image: ProgramImage) {
        debug!(statements = image.statements().len(); "Program image ready");
        self.image = Some(image);
        self.simulator = None;
    }

    pub fn image(&self) -> Option<&ProgramImage> {
        self.image.as_ref()
    }

    /// Prepares a fresh simulation of the program with arguments and standard input.
    pub fn setup<S: AsRef<str>>(
        &mut self,
        args: &[S],
        stdin: impl Into<Vec<u8>>,
    ) -> Result<(), SetupError> {
        let image = self.image.as_ref().ok_or(SetupError::NotLoaded)?;
        let mut core = Core::new(Arc::clone(&self.instruction_set), self.options.core.clone());
        core.load(image)?;
        core.push_arguments(args)?;
        core.environment_mut().set_stdin(stdin);
        self.simulator = Some(Simulator::new(core, self.options.max_steps));
        Ok(())
    }

    /// Runs the program until it halts.
    pub fn simulate(&mut self) -> Result<Reason, SetupError> {
        Ok(self.simulator_mut()?.run())
    }

    /// Executes a single statement. Returns the reason if the program halted.
    pub fn step(&mut self) -> Result<Option<Reason>, SetupError> {
        Ok(self.simulator_mut()?.step())
    }

    /// A handle to stop the simulation from another thread.
    pub fn stop_handle(&self) -> Result<StopHandle, SetupError> {
        Ok(self.simulator()?.stop_handle())
    }

    pub fn simulator(&self) -> Result<&Simulator, SetupError> {
        self.simulator.as_ref().ok_or(SetupError::NotSetUp)
    }

    pub fn simulator_mut(&mut self) -> Result<&mut Simulator, SetupError> {
        self.simulator.as_mut().ok_or(SetupError::NotSetUp)
    }

    /// The exit code after [`Reason::NormalTermination`].
    pub fn exit_code(&self) -> Option<i32> {
        self.simulator.as_ref().and_then(Simulator::exit_code)
    }

    /// The fault after [`Reason::Exception`].
    pub fn fault(&self) -> Option<&Fault> {
        self.simulator.as_ref().and_then(Simulator::fault)
    }

    pub fn stdout(&self) -> &[u8] {
        self.simulator
            .as_ref()
            .map(|simulator| simulator.core().environment().stdout())
            .unwrap_or_default()
    }

    pub fn stderr(&self) -> &[u8] {
        self.simulator
            .as_ref()
            .map(|simulator| simulator.core().environment().stderr())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::BasicAssembler;
    use crate::core::Exception;
    use crate::cs_registers::CsrEntry;
    use crate::registers::Specifier;

    fn assembled(source: &str) -> Program {
        let mut program = Program::new(Options::default());
        let files = [SourceFile::new("test.s", source)];
        program.assemble(&BasicAssembler::new(), &files).unwrap();
        program.setup::<&str>(&[], "").unwrap();
        program
    }

    fn t0(program: &Program) -> u32 {
        program
            .simulator()
            .unwrap()
            .core()
            .registers()
            .x(Specifier::T0)
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut program = Program::new(Options::default());
        assert_eq!(Err(SetupError::NotLoaded), program.setup::<&str>(&[], ""));
        assert_eq!(Err(SetupError::NotSetUp), program.simulate());
        assert_eq!(None, program.exit_code());
        assert!(program.stdout().is_empty());
    }

    #[test]
    fn test_statement_display() {
        let statement = ProgramStatement::new(0x0040_0010, 0x73);
        assert_eq!("0x00400010", statement.to_string());
        let source = SourceLocation {
            file: "main.s".to_owned(),
            line: 3,
            text: "ecall".to_owned(),
        };
        let statement = statement.with_source(Arc::new(source));
        assert_eq!("0x00400010 (main.s:3)", statement.to_string());
        assert_eq!(Some(3), statement.line());
    }

    #[test]
    fn test_text_end() {
        let mut image = ProgramImage::new();
        assert_eq!(None, image.text_end());
        image.push_statement(ProgramStatement::new(0x0040_0004, 0));
        image.push_statement(ProgramStatement::new(0x0040_0000, 0));
        assert_eq!(Some(0x0040_0008), image.text_end());
    }

    #[test]
    fn test_csr_swap_and_exit() {
        let mut program = assembled(
            "
            addi t1, zero, 0xFF
            csrrw t0, 10, t1
            addi a7, zero, 10
            ecall
            ",
        );
        program
            .simulator_mut()
            .unwrap()
            .core_mut()
            .csrs_mut()
            .insert(CsrEntry::new(10, "custom", 7));
        assert_eq!(Ok(Reason::NormalTermination), program.simulate());
        assert_eq!(Some(0), program.exit_code());
        assert_eq!(7, t0(&program));
        let core = program.simulator().unwrap().core();
        assert_eq!(Some(0xFF), core.csrs().get(10));
    }

    #[test]
    fn test_csr_immediate_and_exit() {
        let mut program = assembled("csrrwi t0, 10, 31\naddi a7, zero, 10\necall\n");
        program
            .simulator_mut()
            .unwrap()
            .core_mut()
            .csrs_mut()
            .insert(CsrEntry::new(10, "custom", 7));
        assert_eq!(Ok(Reason::NormalTermination), program.simulate());
        assert_eq!(Some(0), program.exit_code());
        assert_eq!(7, t0(&program));
    }

    #[test]
    fn test_unmapped_csr_halts() {
        let mut program = assembled("addi t0, zero, 5\ncsrrwi t0, 0x70F, 31\necall\n");
        assert_eq!(Ok(Reason::Exception), program.simulate());
        let fault = program.fault().unwrap();
        assert_eq!(Exception::IllegalInstruction, fault.exception());
        assert_eq!(Some(2), fault.statement().line());
        assert_eq!(5, t0(&program));
        assert_eq!(None, program.exit_code());
    }

    #[test]
    fn test_output_and_arguments() {
        let mut program = Program::new(Options::default());
        let source = "
            .data
            greeting: .asciz \"hi \"
            .text
            lw t0, 4(a1)         # argv[1]
            addi a7, zero, 4
            lui a0, %hi(greeting)
            ";
        let files = [SourceFile::new("args.s", source)];
        let errors = program.assemble(&BasicAssembler::new(), &files).unwrap_err();
        assert_eq!(1, errors.error_count());
        assert_eq!(7, errors.messages()[0].line);

        let source = "
            .data
            greeting: .asciz \"hi \"
            .text
            lw s0, 4(a1)
            addi a7, zero, 4
            lui a0, 0x10010
            ecall
            addi a0, s0, 0
            ecall
            addi a0, zero, 3
            addi a7, zero, 93
            ecall
            ";
        let files = [SourceFile::new("args.s", source)];
        program.assemble(&BasicAssembler::new(), &files).unwrap();
        program.setup(&["prog", "there"], "").unwrap();
        assert_eq!(Ok(Reason::NormalTermination), program.simulate());
        assert_eq!(Some(3), program.exit_code());
        assert_eq!(b"hi there", program.stdout());

        // Setting up again restarts from the image
        program.setup(&["prog", "again"], "").unwrap();
        assert_eq!(Ok(Reason::NormalTermination), program.simulate());
        assert_eq!(b"hi again", program.stdout());
    }

    #[test]
    fn test_step_limit() {
        let mut program = Program::new(Options {
            max_steps: Some(10),
            ..Options::default()
        });
        let files = [SourceFile::new("loop.s", "loop: addi t0, t0, 1\njal zero, loop\n")];
        program.assemble(&BasicAssembler::new(), &files).unwrap();
        program.setup::<&str>(&[], "").unwrap();
        assert_eq!(Ok(Reason::StepLimit), program.simulate());
        assert_eq!(5, t0(&program));
        assert_eq!(10, program.simulator().unwrap().steps());
    }
}
