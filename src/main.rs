use lc3::console::{StdConsole, TerminalGuard};
use lc3::vm::{Args, VM};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::error;

const EXIT_STARTUP_FAILED: u8 = 1;
const EXIT_FAULT: u8 = 3;
const EXIT_INTERRUPTED: u8 = 130;

/// LC-3 virtual machine
#[derive(Parser)]
struct Cli {
    /// Object images to load, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Address at which to start executing (hex)
    #[arg(long, default_value = "0x3000", value_parser = parse_addr)]
    start: u16,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_prefix('x'))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("bad address `{s}`: {e}"))
}

fn run(cli: Cli) -> u8 {
    let args = Args {
        images: cli.images,
        offset: cli.start,
    };

    let guard = match TerminalGuard::acquire() {
        Ok(guard) => guard,
        Err(e) => {
            error!("failed to set up terminal: {e}");
            return EXIT_STARTUP_FAILED;
        }
    };

    let mut vm = VM::new(Arc::new(StdConsole::new(&guard)));
    if let Err(e) = vm.boot(&args) {
        drop(guard);
        eprintln!("{e}");
        return EXIT_STARTUP_FAILED;
    }

    let result = vm.run();
    drop(guard);

    match result {
        Ok(()) => 0,
        Err(e) if e.is_interrupt() => {
            eprintln!("interrupted");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            eprintln!("error {e}, halting...");
            EXIT_FAULT
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    ExitCode::from(run(cli))
}
