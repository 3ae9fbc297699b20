mod cli;

use clap::Parser;
use cli::Cli;
use iloc_ir::{read_program, verify_register_bound, IlocPass, LocalRegisterAllocator, Renumberer};
use ivm::constants::DEFAULT_PHYSICAL_REGS;
use ivm::Interpreter;
use std::process;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let mut program = read_program(&cli.program_file).unwrap_or_else(|e| {
        eprintln!("Error reading '{}': {}", cli.program_file.display(), e);
        process::exit(1);
    });

    if cli.renumber {
        let summary = Renumberer::new().process(&mut program)?;
        if cli.verbose {
            println!(
                "Renumbered {} registers and {} labels",
                summary.registers, summary.labels
            );
        }
    }

    if let Some(regs) = cli.register_budget(DEFAULT_PHYSICAL_REGS) {
        let stats = LocalRegisterAllocator::with_registers(regs).process(&mut program)?;
        verify_register_bound(&program, regs)?;
        if cli.verbose {
            println!(
                "Allocated {} blocks with {} registers ({} spill stores, {} spill loads)",
                stats.blocks, regs, stats.spill_stores, stats.spill_loads
            );
        }
    }

    if cli.verbose {
        print!("{}", program);
        println!();
    }

    let mut vm = Interpreter::new().with_trace(cli.trace);
    match vm.process(&program) {
        Ok(value) => {
            println!();
            println!("{}", value);
            if vm.advisories() > 0 {
                eprintln!("{} warning(s) during execution", vm.advisories());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Execution error: {}", e);
            process::exit(1);
        }
    }
}
