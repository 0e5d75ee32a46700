// file: src/main.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-234567hijklm

//! host-provision - main entry point

use clap::Parser;
use host_provision::{
    cli::{args::Cli, commands::*},
    logging::logger,
};
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if let Err(e) = logger::init_logger(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::from(exit_code_for(&e));
    }

    match provision_command(&cli).await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
