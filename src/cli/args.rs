// file: src/cli/args.rs
// version: 2.0.0
// guid: f6g7h8i9-j0k1-2345-6789-012345fghijk

//! Command line argument definitions

use clap::Parser;
use std::path::PathBuf;

/// Settings themselves come from the environment (SSH_PORT, CREATE_USER, ...)
/// or an env file; the flags only control how the run behaves.
#[derive(Parser, Debug)]
#[command(name = "host-provision")]
#[command(about = "Harden and bootstrap a freshly installed Debian/Ubuntu server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// KEY=VALUE file read before the process environment
    #[arg(short, long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Never prompt; missing values use defaults or fail
    #[arg(long)]
    pub non_interactive: bool,

    /// Print the collected config, firewall plan and step plan, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Append a plain-text debug log to this path
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}
