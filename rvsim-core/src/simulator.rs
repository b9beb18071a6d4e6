use crate::core::trap::Fault;
use crate::core::{Core, Outcome};
use log::{debug, trace};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Why a simulation halted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Reason {
    /// The program exited, or ran past its last statement.
    NormalTermination,
    /// An `ebreak` was executed.
    Breakpoint,
    /// A statement raised an exception that no trap handler took care of.
    Exception,
    /// The configured maximum number of steps was executed.
    StepLimit,
    /// A stop was requested through a [`StopHandle`].
    ExternalStop,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NormalTermination => "normal_termination",
            Self::Breakpoint => "breakpoint",
            Self::Exception => "exception",
            Self::StepLimit => "step_limit",
            Self::ExternalStop => "external_stop",
        })
    }
}

/// Requests a running [`Simulator`] to stop. Can be sent to other threads.
///
/// The request is observed before the next statement executes, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives a [`Core`] one statement at a time until it halts.
///
/// ```text
/// Running --step--> Running
///    |
///    +--exit / ebreak / fault / step limit / stop--> Halted(Reason)
/// ```
///
/// Halting is final: once a reason was determined, [`step`](Self::step) and [`run`](Self::run)
/// return it without executing anything.
#[derive(Debug)]
pub struct Simulator {
    core: Core,
    max_steps: Option<u64>,
    steps: u64,
    stop: StopHandle,
    reason: Option<Reason>,
    exit_code: Option<i32>,
    fault: Option<Fault>,
}

impl Simulator {
    pub fn new(core: Core, max_steps: Option<u64>) -> Self {
        Self {
            core,
            max_steps,
            steps: 0,
            stop: StopHandle::default(),
            reason: None,
            exit_code: None,
            fault: None,
        }
    }

    /// Provides immutable access to the simulated core.
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Provides mutable access to the simulated core, e.g. to preload registers before running.
    pub fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Number of statements executed so far, including the one that faulted.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// The reason the simulation halted, or `None` while it is still running.
    pub fn reason(&self) -> Option<Reason> {
        self.reason
    }

    pub fn is_halted(&self) -> bool {
        self.reason.is_some()
    }

    /// The exit code, once halted with [`Reason::NormalTermination`].
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// The unhandled fault, once halted with [`Reason::Exception`].
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Execute a single statement, unless the simulation halts before it.
    ///
    /// Returns the reason if the simulation is halted afterwards.
    pub fn step(&mut self) -> Option<Reason> {
        if self.reason.is_some() {
            return self.reason;
        }
        if self.stop.is_stop_requested() {
            return Some(self.halt(Reason::ExternalStop));
        }
        if self.core.text_end() == Some(self.core.registers().pc()) {
            trace!("Ran past the last statement");
            self.exit_code = Some(0);
            return Some(self.halt(Reason::NormalTermination));
        }
        if self.max_steps.is_some_and(|max_steps| self.steps >= max_steps) {
            return Some(self.halt(Reason::StepLimit));
        }

        self.steps += 1;
        match self.core.step() {
            Ok(Outcome::Continue) => None,
            Ok(Outcome::Exit(code)) => {
                self.exit_code = Some(code);
                Some(self.halt(Reason::NormalTermination))
            }
            Ok(Outcome::Breakpoint) => Some(self.halt(Reason::Breakpoint)),
            Err(fault) => {
                self.fault = Some(fault);
                Some(self.halt(Reason::Exception))
            }
        }
    }

    /// Step until the simulation halts.
    pub fn run(&mut self) -> Reason {
        loop {
            if let Some(reason) = self.step() {
                return reason;
            }
        }
    }

    fn halt(&mut self, reason: Reason) -> Reason {
        debug!(
            reason:% = reason,
            steps = self.steps,
            pc = self.core.registers().pc();
            "Simulation halted"
        );
        if let Some(fault) = &self.fault {
            debug!("{fault}");
        }
        self.reason = Some(reason);
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, Exception};
    use crate::cs_registers::specifier::{UEPC, UTVEC};
    use crate::instruction::InstructionSet;
    use crate::program::{ProgramImage, ProgramStatement};
    use crate::registers::Specifier;

    const TEXT: u32 = 0x0040_0000;

    fn encode(mnemonic: &str, operands: &[i32]) -> u32 {
        InstructionSet::standard().encode(mnemonic, operands).unwrap()
    }

    fn build(words: &[u32], max_steps: Option<u64>) -> Simulator {
        let set = Arc::new(InstructionSet::standard());
        let mut image = ProgramImage::new();
        for (index, &raw) in words.iter().enumerate() {
            image.push_statement(ProgramStatement::new(TEXT + 4 * index as u32, raw));
        }
        let mut core = Core::new(set, Config::default());
        core.load(&image).unwrap();
        Simulator::new(core, max_steps)
    }

    #[test]
    fn test_exit() {
        let mut simulator = build(
            &[
                encode("addi", &[10, 0, 42]),
                encode("addi", &[17, 0, 93]),
                encode("ecall", &[]),
                encode("addi", &[10, 0, 1]),
            ],
            None,
        );
        assert_eq!(Reason::NormalTermination, simulator.run());
        assert_eq!(Some(42), simulator.exit_code());
        assert_eq!(3, simulator.steps());
        assert_eq!(None, simulator.fault());
    }

    #[test]
    fn test_fall_off_end() {
        let mut simulator = build(&[encode("addi", &[5, 0, 1]), encode("addi", &[5, 5, 1])], None);
        assert_eq!(None, simulator.step());
        assert_eq!(None, simulator.step());
        assert_eq!(Some(Reason::NormalTermination), simulator.step());
        assert_eq!(Some(0), simulator.exit_code());
        assert_eq!(2, simulator.steps());
    }

    #[test]
    fn test_exception_is_final() {
        let mut simulator = build(&[encode("lw", &[5, 0, 0]), encode("addi", &[6, 0, 1])], None);
        assert_eq!(Reason::Exception, simulator.run());
        let fault = simulator.fault().unwrap();
        assert_eq!(Exception::LoadAccessFault, fault.exception());
        assert_eq!(TEXT, fault.statement().address());

        assert_eq!(Some(Reason::Exception), simulator.step());
        assert_eq!(Reason::Exception, simulator.run());
        assert_eq!(1, simulator.steps());
        assert_eq!(0, simulator.core().registers().x(Specifier::from_u5(6)));
    }

    #[test]
    fn test_handler_without_epc_halts() {
        let mut simulator = build(&[0xFFFF_FFFF, encode("uret", &[])], Some(1000));
        let csrs = simulator.core_mut().csrs_mut();
        csrs.set(UTVEC, TEXT + 4).unwrap();
        csrs.remove(UEPC);

        assert_eq!(Reason::Exception, simulator.run());
        assert_eq!(1, simulator.steps());
        assert_eq!(TEXT, simulator.core().registers().pc());
        assert_eq!(
            Exception::IllegalInstruction,
            simulator.fault().unwrap().exception()
        );
    }

    #[test]
    fn test_breakpoint() {
        let mut simulator = build(&[encode("addi", &[5, 0, 1]), encode("ebreak", &[])], None);
        assert_eq!(Reason::Breakpoint, simulator.run());
        assert_eq!(TEXT + 4, simulator.core().registers().pc());
        assert_eq!(None, simulator.exit_code());
    }

    #[test]
    fn test_step_limit() {
        let mut simulator = build(&[encode("addi", &[5, 5, 1]), encode("jal", &[0, -4])], Some(7));
        assert_eq!(Reason::StepLimit, simulator.run());
        assert_eq!(7, simulator.steps());
        assert_eq!(4, simulator.core().registers().x(Specifier::T0));

        let mut simulator = build(&[encode("addi", &[5, 5, 1])], Some(0));
        assert_eq!(Some(Reason::StepLimit), simulator.step());
        assert_eq!(0, simulator.core().registers().x(Specifier::T0));
    }

    #[test]
    fn test_external_stop() {
        let mut simulator = build(&[encode("jal", &[0, 0])], None);
        let handle = simulator.stop_handle();
        for _ in 0..3 {
            assert_eq!(None, simulator.step());
        }
        let worker = std::thread::spawn(move || handle.stop());
        worker.join().unwrap();
        assert_eq!(Reason::ExternalStop, simulator.run());
        assert_eq!(3, simulator.steps());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!("normal_termination", Reason::NormalTermination.to_string());
        assert_eq!("step_limit", Reason::StepLimit.to_string());
    }
}
