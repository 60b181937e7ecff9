use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use octochip::output::{file_message, message, print_state, MsgColor};
use octochip::term::{TermDisplay, TermKeyboard, TerminalGuard};
use octochip::{disassemble, env, Machine, RunError, RunOptions, DEFAULT_SEED};

/// Octochip is an interpreter and disassembler for CHIP-8 programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a program to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program in the terminal. Press ESC to quit
    Run {
        /// Program image to run
        name: PathBuf,
        /// Seed for the `RND` instruction
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        /// Print machine state before and after running
        #[arg(short, long)]
        dump: bool,
        /// Print every executed instruction to stderr (best redirected to a file)
        #[arg(short, long)]
        trace: bool,
    },
    /// Print program listing with resolved jump and call labels
    Disasm {
        /// Program image to disassemble
        name: PathBuf,
        /// Destination file, instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    env::init();

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                seed,
                dump,
                trace,
            } => {
                let options = RunOptions {
                    seed,
                    trace: trace || env::is_trace_enabled(),
                };
                run(&name, options, dump)
            }
            Command::Disasm { name, output } => {
                file_message(Green, "Disassembling", &name);
                let image = fs::read(&name).into_diagnostic()?;
                let listing = disassemble(&image);
                match output {
                    Some(dest) => {
                        let mut file = File::create(&dest).into_diagnostic()?;
                        listing.write_to(&mut file).into_diagnostic()?;
                        file_message(Green, "Saved", &dest);
                    }
                    None => {
                        listing.write_to(&mut io::stdout().lock()).into_diagnostic()?;
                    }
                }
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        let options = RunOptions {
            trace: env::is_trace_enabled(),
            ..Default::default()
        };
        run(&path, options, false)
    } else {
        println!("\n~ octochip v{VERSION} ~");
        println!("{}", LOGO.truecolor(120, 220, 140).bold());
        println!("{SHORT_INFO}");
        Ok(())
    }
}

fn run(name: &Path, options: RunOptions, dump: bool) -> Result<()> {
    use MsgColor::*;
    file_message(Green, "Loading", name);
    // Nothing is constructed until the whole image is read
    let image = fs::read(name).into_diagnostic()?;
    let mut machine = Machine::with_options(&image, options).into_diagnostic()?;
    if dump {
        print_state(&machine);
    }

    message(Green, "Running", "press ESC to quit");
    let result = {
        let guard = TerminalGuard::enter().into_diagnostic()?;
        let mut display = TermDisplay::new();
        let mut keyboard = TermKeyboard::new(env::key_hold(), guard.reports_release());
        machine.run(&mut display, &mut keyboard)
        // Terminal is restored here, before anything else is printed
    };

    match result {
        Ok(()) => {
            message(Cyan, "Quit", "stopped by user");
            if dump {
                print_state(&machine);
            }
            file_message(Green, "Completed", name);
            Ok(())
        }
        Err(RunError::Fault(fault)) => {
            message(Red, "Fault", &fault.to_string());
            print_state(&machine);
            Err(RunError::Fault(fault)).into_diagnostic()
        }
        Err(error) => Err(error).into_diagnostic(),
    }
}

const LOGO: &str = r#"
   ____       __             __    _
  / __ \_____/ /_____  _____/ /_  (_)___
 / / / / ___/ __/ __ \/ ___/ __ \/ / __ \
/ /_/ / /__/ /_/ /_/ / /__/ / / / / /_/ /
\____/\___/\__/\____/\___/_/ /_/_/ .___/
                                /_/"#;

const SHORT_INFO: &str = r"
Run a CHIP-8 program with `octochip run <file>`, or list it with `octochip disasm <file>`.
Please use `-h` or `--help` to access the usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
