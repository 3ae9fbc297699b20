use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ivm",
    about = "ILOC Virtual Machine - Run ILOC programs",
    long_about = "The ILOC Virtual Machine (IVM) executes ILOC programs given as text listings or JSON.\n\
                  Programs may optionally be canonicalized and register-allocated before they run.",
    version,
    author
)]
pub struct Cli {
    /// Program to execute (.iloc text or .json)
    pub program_file: PathBuf,

    /// Dump the flattened code and the machine state after every step
    #[arg(short = 't', long)]
    pub trace: bool,

    /// Allocate registers with this many physical registers before running
    #[arg(short = 'r', long, value_name = "N")]
    pub regs: Option<usize>,

    /// Allocate with the default register budget
    #[arg(short = 'a', long, conflicts_with = "regs")]
    pub alloc: bool,

    /// Renumber registers and labels before running
    #[arg(long)]
    pub renumber: bool,

    /// Show the program and allocation statistics before execution
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Register budget to allocate with, if allocation was requested
    pub fn register_budget(&self, default: usize) -> Option<usize> {
        match (self.regs, self.alloc) {
            (Some(regs), _) => Some(regs),
            (None, true) => Some(default),
            (None, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_budget() {
        let cli = Cli::parse_from(["ivm", "prog.iloc"]);
        assert_eq!(cli.register_budget(4), None);

        let cli = Cli::parse_from(["ivm", "prog.iloc", "--alloc"]);
        assert_eq!(cli.register_budget(4), Some(4));

        let cli = Cli::parse_from(["ivm", "prog.iloc", "-r", "3", "--trace"]);
        assert_eq!(cli.register_budget(4), Some(3));
        assert!(cli.trace);
    }

    #[test]
    fn test_regs_conflicts_with_alloc() {
        assert!(Cli::try_parse_from(["ivm", "prog.iloc", "-r", "3", "-a"]).is_err());
    }
}
