//! ILOC Backend Driver
//!
//! Command-line front for the program transformations: canonical
//! renumbering, local register allocation, and register-bound checks.
//! Programs are read as ILOC text or JSON (`.json`); running them is the
//! job of `ivm`.

use clap::{Parser, Subcommand};
use iloc_ir::regalloc::max_block_pressure;
use iloc_ir::{
    read_program, render_program, verify_register_bound, Format, IlocPass,
    LocalRegisterAllocator, Program, Renumberer, DEFAULT_PHYSICAL_REGS,
};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ilocc")]
#[command(about = "ILOC backend passes")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map virtual registers onto a fixed number of physical registers
    Alloc {
        /// Input program (.iloc text or .json)
        input: PathBuf,

        /// Number of physical registers
        #[arg(short, long, default_value_t = DEFAULT_PHYSICAL_REGS)]
        regs: usize,

        /// Renumber registers and labels first
        #[arg(long)]
        renumber: bool,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of ILOC text
        #[arg(long)]
        json: bool,
    },

    /// Renumber registers and labels densely from 1
    Renumber {
        /// Input program (.iloc text or .json)
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit JSON instead of ILOC text
        #[arg(long)]
        json: bool,
    },

    /// Report register pressure and verify a register bound
    Check {
        /// Input program (.iloc text or .json)
        input: PathBuf,

        /// Fail unless every register operand is a physical register below N
        #[arg(short, long, value_name = "N")]
        regs: Option<usize>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Alloc { input, regs, renumber, output, json } => {
            if let Err(e) = alloc_command(&input, regs, renumber, output.as_deref(), json) {
                eprintln!("Error allocating registers: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Renumber { input, output, json } => {
            if let Err(e) = renumber_command(&input, output.as_deref(), json) {
                eprintln!("Error renumbering: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Check { input, regs } => {
            if let Err(e) = check_command(&input, regs) {
                eprintln!("Check failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn alloc_command(
    input: &Path,
    regs: usize,
    renumber: bool,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut program = read_program(input)?;
    if renumber {
        Renumberer::new().process(&mut program)?;
    }

    let stats = LocalRegisterAllocator::with_registers(regs).process(&mut program)?;
    verify_register_bound(&program, regs)?;

    write_program(&program, output, json)?;
    eprintln!(
        "Allocated {} blocks with {} registers: {} spill stores, {} spill loads",
        stats.blocks, regs, stats.spill_stores, stats.spill_loads
    );
    Ok(())
}

fn renumber_command(
    input: &Path,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut program = read_program(input)?;
    let summary = Renumberer::new().process(&mut program)?;
    info!("{} registers, {} labels", summary.registers, summary.labels);
    write_program(&program, output, json)
}

fn check_command(input: &Path, regs: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let mut program = read_program(input)?;

    for function in program.functions.iter_mut() {
        let locals = function.local_size;
        let name = function.name().to_string();
        let cfg = function.cfg_mut()?;
        let pressure = cfg.blocks.iter().map(max_block_pressure).max().unwrap_or(0);
        println!(
            "{}: {} blocks, max block pressure {}, locals={}",
            name,
            cfg.len(),
            pressure,
            locals
        );
    }

    if let Some(regs) = regs {
        verify_register_bound(&program, regs)?;
        println!("All register operands are below {}", regs);
    }
    Ok(())
}

fn write_program(
    program: &Program,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if json { Format::Json } else { Format::Text };
    let text = render_program(program, format)?;
    match output {
        Some(path) => {
            fs::write(path, &text)?;
            eprintln!("Program written to: {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_defaults() {
        let cli = Cli::parse_from(["ilocc", "alloc", "prog.iloc"]);
        match cli.command {
            Commands::Alloc { regs, renumber, output, json, .. } => {
                assert_eq!(regs, DEFAULT_PHYSICAL_REGS);
                assert!(!renumber);
                assert!(output.is_none());
                assert!(!json);
            }
            _ => panic!("expected alloc"),
        }
    }

    #[test]
    fn test_check_takes_optional_budget() {
        let cli = Cli::parse_from(["ilocc", "check", "prog.json", "--regs", "3"]);
        assert!(matches!(cli.command, Commands::Check { regs: Some(3), .. }));
    }
}
