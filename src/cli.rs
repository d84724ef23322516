use crate::dialect::Dialect;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "vcspool")]
#[command(about = "Run git/hg commands through a throttled process queue and parse their status output")]
pub struct CliArgs {
    /// Repository working directory (overrides config)
    #[arg(long)]
    pub repo_dir: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Version control system to drive: git or hg (overrides config)
    #[arg(long)]
    pub dialect: Option<Dialect>,

    /// Maximum number of concurrently running processes
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Kill commands that run longer than this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Clone)]
pub enum CliCommand {
    /// List changed files (default)
    Status,
    /// Print the repository root
    Root,
    /// Run the version control binary with raw arguments
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}
