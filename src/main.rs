//! NameVM command-line driver.
//!
//! Compiles NameLang source files and either runs them to completion,
//! dumps the compiled program, or steps them interactively with full
//! backward stepping.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use namevm::render::render_vm;
use namevm::stepper::Stepper;
use namevm::{boot_vm, compile, run_program};

#[derive(Parser)]
#[command(name = "namevm", version, about = "A time-travelling machine for teaching name binding")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a source file and run it to completion.
    Run {
        file: PathBuf,
        /// Print each instruction and the machine state as it executes.
        #[arg(long)]
        trace: bool,
    },
    /// Compile a source file and print the instruction sequence.
    Compile { file: PathBuf },
    /// Step a program interactively: n/enter = forward, p = back,
    /// q = quit.
    Step { file: PathBuf },
}

fn main() -> Result<()> {
    let log_level = std::env::var("NAMEVM_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { file, trace } => run(&file, trace),
        Command::Compile { file } => dump(&file),
        Command::Step { file } => step(&file),
    }
}

fn read_source(file: &PathBuf) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

fn run(file: &PathBuf, trace: bool) -> Result<()> {
    let source = read_source(file)?;
    let program = compile(&source)?;

    if trace {
        let mut stepper = Stepper::new(program, boot_vm());
        while !stepper.is_done() {
            let pc = stepper.pc();
            let instr = stepper.program().get(pc).cloned();
            match stepper.step_forward() {
                Ok(_) => {
                    if let Some(instr) = instr {
                        println!("[{pc}] {instr}");
                    }
                    print!("{}", render_vm(stepper.vm()));
                }
                Err(e) => {
                    error!(pc, "step failed: {e}");
                    return Err(e.into());
                }
            }
        }
        return Ok(());
    }

    let vm = run_program(&program)?;
    print!("{}", render_vm(&vm));
    Ok(())
}

fn dump(file: &PathBuf) -> Result<()> {
    let source = read_source(file)?;
    let program = compile(&source)?;
    print!("{program}");
    Ok(())
}

fn step(file: &PathBuf) -> Result<()> {
    let source = read_source(file)?;
    let program = compile(&source)?;
    let mut stepper = Stepper::new(program, boot_vm());

    println!("{} instructions; n/enter = forward, p = back, q = quit", stepper.program().len());
    let stdin = io::stdin();
    let mut last_line = None;

    loop {
        print!("[pc {}] > ", stepper.pc());
        io::stdout().flush()?;

        let Some(input) = stdin.lock().lines().next() else {
            break;
        };
        match input?.trim() {
            "q" => break,
            "p" => {
                if !stepper.step_backward() {
                    println!("(at start)");
                    continue;
                }
            }
            "" | "n" => match stepper.step_forward() {
                Ok(namevm::stepper::StepOutcome::Done) => {
                    println!("(at end)");
                    continue;
                }
                Ok(_) => {}
                // A failed lookup aborts the step but not the session;
                // the machine and history are untouched.
                Err(e) => {
                    println!("step failed: {e}");
                    continue;
                }
            },
            other => {
                println!("unknown command '{other}'");
                continue;
            }
        }

        print!("{}", render_vm(stepper.vm()));
        let line = stepper.current_line().cloned();
        if line != last_line {
            if let Some(l) = &line {
                println!("now at source line {l}");
            }
            last_line = line;
        }
    }

    Ok(())
}
