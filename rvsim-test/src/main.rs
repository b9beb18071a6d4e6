use clap::{ArgAction, Parser, ValueEnum};
use log::{debug, error, info};
use rvsim_core::core::Config;
use rvsim_core::elf::{self, Elf};
use rvsim_core::program::{Options, Program};
use rvsim_core::simulator::Reason;
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Halting reasons a test can expect.
#[derive(ValueEnum, Debug, Copy, Clone, Eq, PartialEq)]
enum ExpectedReason {
    NormalTermination,
    Breakpoint,
    Exception,
    StepLimit,
}

impl From<ExpectedReason> for Reason {
    fn from(value: ExpectedReason) -> Self {
        match value {
            ExpectedReason::NormalTermination => Reason::NormalTermination,
            ExpectedReason::Breakpoint => Reason::Breakpoint,
            ExpectedReason::Exception => Reason::Exception,
            ExpectedReason::StepLimit => Reason::StepLimit,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Signature file to output signature to
    #[arg(long, short)]
    signature: Option<PathBuf>,
    /// Stop the test after this many statements
    #[arg(long, default_value_t = 10_000_000)]
    max_steps: u64,
    /// Reason the test is expected to halt with
    #[arg(long, value_enum, default_value_t = ExpectedReason::NormalTermination)]
    expect: ExpectedReason,
    /// Exit code the test is expected to terminate with
    #[arg(long)]
    exit_code: Option<i32>,
    /// Allow stores into the executable segments
    #[arg(long)]
    self_modifying_code: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short, long)]
    quiet: bool,
    /// Elf file to run
    elf: PathBuf,
}

fn invalid_data<E: Into<Box<dyn Error + Send + Sync>>>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn main() -> io::Result<ExitCode> {
    let args = Args::parse();

    stderrlog::new()
        .modules([module_path!(), "rvsim_core"])
        .quiet(args.quiet)
        .verbosity(1 + args.verbose as usize)
        .init()
        .map_err(io::Error::other)?;

    let buf = fs::read(&args.elf)?;
    let elf = Elf::parse(&buf).map_err(invalid_data)?;
    let (image, memory) = elf::load_parsed(&elf, &buf).map_err(invalid_data)?;

    let options = Options {
        core: Config {
            memory,
            self_modifying_code: args.self_modifying_code,
            ..Config::default()
        },
        max_steps: Some(args.max_steps),
    };
    let mut program = Program::new(options);
    program.load(image);
    let test_name = args.elf.display().to_string();
    program
        .setup(&[test_name.as_str()], Vec::new())
        .map_err(io::Error::other)?;

    let reason = program.simulate().map_err(io::Error::other)?;
    io::stdout().write_all(program.stdout())?;

    let mut passed = true;
    if reason != Reason::from(args.expect) {
        error!("Expected the test to halt with {:?}, got {reason}", args.expect);
        if let Some(fault) = program.fault() {
            error!("{fault}");
        }
        passed = false;
    }
    if let Some(expected) = args.exit_code {
        if program.exit_code() != Some(expected) {
            error!(
                "Expected exit code {expected}, got {:?}",
                program.exit_code()
            );
            passed = false;
        }
    }

    if let Some(path) = args.signature {
        let start = elf::symbol(&elf, "begin_signature")
            .ok_or_else(|| invalid_data("missing symbol `begin_signature`"))?;
        let end = elf::symbol(&elf, "end_signature")
            .ok_or_else(|| invalid_data("missing symbol `end_signature`"))?;
        if start % 4 != 0 || end % 4 != 0 || start > end {
            return Err(invalid_data(format!(
                "invalid signature bounds {start:#010x}..{end:#010x}"
            )));
        }
        debug!("Dumping signature [{start:#010x}..{end:#010x})");

        let simulator = program.simulator().map_err(io::Error::other)?;
        let memory = simulator.core().memory();
        let mut file = BufWriter::new(File::create(path)?);
        for address in (start..end).step_by(4) {
            let word = memory.read_word(address).map_err(io::Error::other)?;
            writeln!(file, "{word:08x}")?;
        }
        file.flush()?;
    }

    if passed {
        info!("{test_name}: passed");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
