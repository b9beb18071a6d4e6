use clap::{ArgAction, Parser};
use log::{debug, info};
use rvsim_core::assembler::BasicAssembler;
use rvsim_core::core::Config;
use rvsim_core::elf;
use rvsim_core::program::{Options, Program, SourceFile};
use rvsim_core::simulator::Reason;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code used when the program could not be assembled, loaded or set up.
const SETUP_FAILURE: u8 = 2;
/// Exit code used when the simulation ended other than by the program exiting.
const ABNORMAL_TERMINATION: u8 = 1;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Stop the simulation after this many statements.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Allow stores into the text region, executing the modified words.
    #[arg(long)]
    self_modifying_code: bool,
    /// Allow loads and stores that are not naturally aligned.
    #[arg(long)]
    misaligned: bool,
    /// File to use as the program's standard input.
    #[arg(long)]
    stdin: Option<PathBuf>,
    /// Treat the program as an ELF file.
    #[arg(long, conflicts_with = "asm")]
    elf: bool,
    /// Treat the program as assembly source.
    #[arg(long)]
    asm: bool,
    /// Increase logging verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Silence all logging.
    #[arg(short, long)]
    quiet: bool,
    /// Program to execute, either an ELF file or assembly source.
    program: PathBuf,
    /// Arguments passed to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
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

    let buf = fs::read(&args.program)?;
    let stdin = match &args.stdin {
        Some(path) => fs::read(path)?,
        None => Vec::new(),
    };
    let is_elf = args.elf || (!args.asm && buf.starts_with(elf::MAGIC));

    let mut options = Options {
        core: Config {
            support_misaligned_memory_access: args.misaligned,
            self_modifying_code: args.self_modifying_code,
            ..Config::default()
        },
        max_steps: args.max_steps,
    };

    let mut program = if is_elf {
        let (image, memory) = elf::load(&buf).map_err(invalid_data)?;
        options.core.memory = memory;
        let mut program = Program::new(options);
        program.load(image);
        program
    } else {
        let text = String::from_utf8(buf).map_err(invalid_data)?;
        let name = args.program.display().to_string();
        let mut program = Program::new(options);
        match program.assemble(&BasicAssembler::new(), &[SourceFile::new(name, text)]) {
            Ok(warnings) => debug!("Assembled with {} warning(s)", warnings.warning_count()),
            Err(errors) => {
                for message in errors.messages() {
                    eprintln!("{message}");
                }
                eprintln!("{errors}");
                return Ok(ExitCode::from(SETUP_FAILURE));
            }
        }
        program
    };

    let mut program_args = vec![args.program.display().to_string()];
    program_args.extend(args.args.iter().cloned());
    if let Err(err) = program.setup(program_args.as_slice(), stdin) {
        eprintln!("{err}");
        return Ok(ExitCode::from(SETUP_FAILURE));
    }

    let reason = program.simulate().map_err(io::Error::other)?;

    io::stdout().write_all(program.stdout())?;
    io::stdout().flush()?;
    io::stderr().write_all(program.stderr())?;

    let steps = program.simulator().map_or(0, |simulator| simulator.steps());
    info!(reason:% = reason, steps = steps; "Simulation finished");
    match reason {
        Reason::NormalTermination => {
            let code = program.exit_code().unwrap_or(0);
            eprintln!("\n-- program is finished running ({code}) --");
            Ok(ExitCode::from(code as u8))
        }
        Reason::Exception => {
            if let Some(fault) = program.fault() {
                eprintln!("\n{fault}");
            }
            eprintln!("-- program terminated due to an exception --");
            Ok(ExitCode::from(ABNORMAL_TERMINATION))
        }
        reason => {
            eprintln!("\n-- program stopped: {reason} --");
            Ok(ExitCode::from(ABNORMAL_TERMINATION))
        }
    }
}
