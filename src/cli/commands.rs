// file: src/cli/commands.rs
// version: 2.0.0
// guid: g7h8i9j0-k1l2-3456-7890-123456ghijkl

//! Command implementations for the CLI

use super::args::Cli;
use crate::{
    config::{loader::ConfigLoader, HostPaths, ProvisioningConfig, RawInput},
    error::ProvisionError,
    executor::LocalHost,
    firewall::Ruleset,
    input::{InputCollector, TerminalPrompter},
    orchestrator::Orchestrator,
    steps::StepContext,
    Result,
};
use std::fmt::Write as _;
use std::path::Path;
use tokio::signal;
use tracing::{error, info, warn};

/// How a provisioning invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step ran; non-fatal failures may be listed in the summary
    Completed,
    /// A fatal step failure stopped the run
    Aborted,
    /// Dry run: nothing was applied
    Planned,
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Completed | RunStatus::Planned => 0,
            RunStatus::Aborted => 1,
        }
    }
}

/// Exit code for an error that ended the run before or outside the steps
pub fn exit_code_for(err: &ProvisionError) -> u8 {
    if err.is_input_error() || matches!(err, ProvisionError::Permission(_)) {
        2
    } else {
        1
    }
}

/// Static input: env file first, process environment on top
pub fn load_raw_input(env_file: Option<&Path>) -> Result<RawInput> {
    let from_file = match env_file {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            ConfigLoader::new().load_env_file(path)?
        }
        None => RawInput::new(),
    };
    Ok(from_file.merged_with(RawInput::from_process_env()))
}

/// Check if running as root
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Human-readable plan for `--dry-run`
pub fn render_plan(config: &ProvisioningConfig) -> Result<String> {
    let orchestrator = Orchestrator::new();
    let ruleset = Ruleset::perimeter(config.ssh_port, &config.extra_tcp_ports, &config.extra_udp_ports);

    let mut out = String::new();
    let _ = writeln!(out, "Configuration:\n{}", serde_json::to_string_pretty(config)?);
    let _ = writeln!(out, "\nFirewall (INPUT policy drop):");
    for label in ruleset.labels() {
        let _ = writeln!(out, "  {}", label);
    }
    let _ = writeln!(out, "\nSteps:");
    for (index, step) in orchestrator.steps().iter().enumerate() {
        let action = if step.applies(config) {
            "run".to_string()
        } else {
            format!("skip ({})", step.skip_reason())
        };
        let _ = writeln!(out, "  {}. {:<18} {}", index + 1, step.name(), action);
    }
    Ok(out)
}

/// Collect input and provision this host
pub async fn provision_command(cli: &Cli) -> Result<RunStatus> {
    let raw = load_raw_input(cli.env_file.as_deref())?;

    let non_interactive = cli.non_interactive;
    let config = tokio::task::spawn_blocking(move || {
        let mut prompter = TerminalPrompter::new();
        let collector = InputCollector::new(raw, &mut prompter);
        if non_interactive {
            collector.non_interactive().collect()
        } else {
            collector.collect()
        }
    })
    .await
    .map_err(|e| ProvisionError::config(format!("Input collection was interrupted: {}", e)))??;

    if cli.dry_run {
        info!("DRY RUN: no changes will be made");
        print!("{}", render_plan(&config)?);
        return Ok(RunStatus::Planned);
    }

    if !is_root() {
        return Err(ProvisionError::permission(
            "host-provision must run as root (use sudo), or pass --dry-run",
        ));
    }

    // From here on a step must never be abandoned half-way through a write
    tokio::spawn(async {
        while signal::ctrl_c().await.is_ok() {
            warn!("Interrupt ignored: provisioning continues until the current run finishes");
        }
    });

    let paths = HostPaths::default();
    let mut host = LocalHost::new();
    let summary = {
        let mut ctx = StepContext::new(&config, &paths, &mut host);
        Orchestrator::new().run(&mut ctx).await
    };

    print!("{}", summary.render());

    if let Some(path) = &cli.report {
        if let Err(e) = summary.write_report(path).await {
            error!("Failed to write run report to {}: {}", path.display(), e);
        }
    }

    Ok(if summary.is_success() {
        RunStatus::Completed
    } else {
        RunStatus::Aborted
    })
}
