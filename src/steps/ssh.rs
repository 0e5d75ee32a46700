// file: src/steps/ssh.rs
// version: 1.1.0
// guid: 2e7b9f04-6a3c-4d81-b5f2-c90d1e8a7b63

//! SSH daemon hardening

use super::directives::DirectiveMap;
use super::{StepContext, StepResult};
use crate::error::ProvisionError;
use crate::executor::HostCommand;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const NAME: &str = "ssh-hardening";

/// Directives enforced in the global section of sshd_config
pub fn hardened_directives(port: u16) -> Vec<(&'static str, String)> {
    vec![
        ("Port", port.to_string()),
        ("PermitRootLogin", "no".to_string()),
        ("PasswordAuthentication", "no".to_string()),
        ("PubkeyAuthentication", "yes".to_string()),
        ("UsePAM", "yes".to_string()),
    ]
}

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    let config_path = ctx.paths.sshd_config.clone();
    let original = ctx.host.read_file(&config_path).await?.ok_or_else(|| {
        ProvisionError::config(format!("{} does not exist", config_path.display()))
    })?;

    let backup = backup_path(&config_path);
    ctx.host.write_file(&backup, &original).await?;

    let directives = hardened_directives(ctx.config.ssh_port);
    let mut map = DirectiveMap::parse(&original);
    for (key, value) in &directives {
        map.set(key, value);
    }
    ctx.host.write_file(&config_path, &map.render()).await?;
    info!(
        "Rewrote {} (backup at {})",
        config_path.display(),
        backup.display()
    );

    let overridden = align_dropins(ctx, &config_path, &directives).await?;

    ctx.host
        .run_checked(&HostCommand::new("sshd").arg("-t"))
        .await?;
    let reload_warning = restart(ctx).await?;

    let mut result = StepResult::success(
        NAME,
        format!("sshd listening on port {}; root and password login disabled", ctx.config.ssh_port),
    );
    for file in overridden {
        result = result.with_detail(StepResult::success(
            "ssh-dropin",
            format!("aligned overrides in {}", file.display()),
        ));
    }

    if let Some(warning) = reload_warning {
        result = result.with_warning(warning);
    }

    if !has_authorized_keys(ctx).await? {
        result = result.with_warning(
            "no authorized_keys found for root or the provisioned user; key login must be set up before disconnecting",
        );
    }

    Ok(result)
}

fn backup_path(config_path: &Path) -> PathBuf {
    let mut name = config_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".bak");
    config_path.with_file_name(name)
}

/// Drop-ins are included before the main file, and sshd keeps the first value
/// it sees, so any conflicting directive there must be rewritten too.
async fn align_dropins(
    ctx: &mut StepContext<'_>,
    config_path: &Path,
    directives: &[(&'static str, String)],
) -> Result<Vec<PathBuf>> {
    let dropin_dir = config_path.with_file_name("sshd_config.d");
    let listing = ctx
        .host
        .run(&HostCommand::new("find").args([
            dropin_dir.display().to_string().as_str(),
            "-maxdepth",
            "1",
            "-type",
            "f",
            "-name",
            "*.conf",
        ]))
        .await?;
    if !listing.is_success() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = listing
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    files.sort();

    let mut changed = Vec::new();
    for file in files {
        let Some(content) = ctx.host.read_file(&file).await? else {
            continue;
        };
        let mut map = DirectiveMap::parse(&content);
        let mut touched = false;
        for (key, value) in directives {
            touched |= map.set_existing(key, value);
        }
        if touched {
            warn!("Overriding conflicting sshd directives in {}", file.display());
            ctx.host.write_file(&file, &map.render()).await?;
            changed.push(file);
        }
    }

    Ok(changed)
}

/// Restart sshd; returns a warning when the unit reload failed
async fn restart(ctx: &mut StepContext<'_>) -> Result<Option<String>> {
    // Socket-activated sshd reads the port from generated units
    let reload_warning = if ctx
        .host
        .probe(&HostCommand::new("systemctl").arg("daemon-reload"))
        .await?
    {
        None
    } else {
        Some("systemctl daemon-reload failed; a socket-activated sshd may still listen on the old port".to_string())
    };
    if ctx
        .host
        .probe(&HostCommand::new("systemctl").args(["is-active", "--quiet", "ssh.socket"]))
        .await?
    {
        ctx.host
            .run_checked(&HostCommand::new("systemctl").args(["restart", "ssh.socket"]))
            .await?;
    }

    let primary = HostCommand::new("systemctl").args(["restart", "ssh"]);
    let outcome = ctx.host.run(&primary).await?;
    if outcome.is_success() {
        return Ok(reload_warning);
    }

    warn!("Restarting ssh failed, trying the sshd unit name");
    let fallback = HostCommand::new("systemctl").args(["restart", "sshd"]);
    if ctx.host.probe(&fallback).await? {
        return Ok(reload_warning);
    }

    outcome.into_checked(&primary).map(|_| reload_warning)
}

async fn has_authorized_keys(ctx: &mut StepContext<'_>) -> Result<bool> {
    let mut candidates = vec![ctx.paths.root_authorized_keys.clone()];
    if let Some(user) = &ctx.resolved_user {
        candidates.push(ctx.paths.user_authorized_keys(user));
    }

    for path in candidates {
        if let Some(content) = ctx.host.read_file(&path).await? {
            if content.lines().any(|l| !l.trim().is_empty() && !l.trim().starts_with('#')) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::super::{Step, StepOutcome};
    use super::*;
    use crate::config::{HostPaths, ProvisioningConfig};
    use crate::executor::{CommandOutcome, RecordingHost};

    const SSHD: &str = "Include /etc/ssh/sshd_config.d/*.conf\n#Port 22\n#PermitRootLogin prohibit-password\nUsePAM yes\n";

    fn host() -> RecordingHost {
        RecordingHost::new()
            .with_file("/etc/ssh/sshd_config", SSHD)
            .with_file("/root/.ssh/authorized_keys", "ssh-ed25519 AAAA admin\n")
            .fail("systemctl is-active")
            .fail("find")
    }

    async fn apply(config: &ProvisioningConfig, host: &mut RecordingHost) -> StepResult {
        let paths = HostPaths::default();
        let mut ctx = StepContext::new(config, &paths, host);
        Step::SshHardening.apply(&mut ctx).await
    }

    #[tokio::test]
    async fn test_hardening_rewrites_config() {
        // Arrange
        let mut config = ProvisioningConfig::default();
        config.ssh_port = 2222;
        let mut host = host();

        // Act
        let result = apply(&config, &mut host).await;

        // Assert
        assert_eq!(result.outcome, StepOutcome::Success);
        assert!(result.warnings.is_empty());
        let written = DirectiveMap::parse(host.file("/etc/ssh/sshd_config").unwrap());
        assert_eq!(written.get("Port"), Some("2222"));
        assert_eq!(written.get("PermitRootLogin"), Some("no"));
        assert_eq!(written.get("PasswordAuthentication"), Some("no"));
        assert_eq!(written.get("PubkeyAuthentication"), Some("yes"));
        assert_eq!(written.get("UsePAM"), Some("yes"));
        assert_eq!(host.file("/etc/ssh/sshd_config.bak"), Some(SSHD));
    }

    #[tokio::test]
    async fn test_default_port_is_22() {
        let config = ProvisioningConfig::default();
        let mut host = host();

        apply(&config, &mut host).await;

        let written = DirectiveMap::parse(host.file("/etc/ssh/sshd_config").unwrap());
        assert_eq!(written.get("Port"), Some("22"));
    }

    #[tokio::test]
    async fn test_syntax_check_precedes_restart() {
        let config = ProvisioningConfig::default();
        let mut host = host();

        apply(&config, &mut host).await;

        let check = host.position("sshd -t").unwrap();
        let restart = host.position("systemctl restart ssh").unwrap();
        assert!(check < restart);
    }

    #[tokio::test]
    async fn test_restart_falls_back_to_sshd_unit() {
        let config = ProvisioningConfig::default();
        let mut host = host().fail("systemctl restart ssh");
        let mut host_ok = host.clone().respond("systemctl restart sshd", CommandOutcome::success(""));

        let failed = apply(&config, &mut host).await;
        let recovered = apply(&config, &mut host_ok).await;

        assert!(failed.is_fatal_failure());
        assert_eq!(recovered.outcome, StepOutcome::Success);
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal_and_not_restarted() {
        let config = ProvisioningConfig::default();
        let mut host = host().fail("sshd -t");

        let result = apply(&config, &mut host).await;

        assert!(result.is_fatal_failure());
        assert!(!host.ran("systemctl restart"));
    }

    #[tokio::test]
    async fn test_conflicting_dropin_is_aligned() {
        // Arrange
        let dropin = "/etc/ssh/sshd_config.d/50-cloud-init.conf";
        let config = ProvisioningConfig::default();
        let mut host = host()
            .respond("find", CommandOutcome::success(format!("{}\n", dropin)))
            .with_file(dropin, "PasswordAuthentication yes\n");

        // Act
        let result = apply(&config, &mut host).await;

        // Assert
        assert_eq!(result.details.len(), 1);
        assert_eq!(host.file(dropin), Some("PasswordAuthentication no\n"));
    }

    #[tokio::test]
    async fn test_missing_keys_produce_warning() {
        let config = ProvisioningConfig::default();
        let mut host = RecordingHost::new()
            .with_file("/etc/ssh/sshd_config", SSHD)
            .fail("find");

        let result = apply(&config, &mut host).await;

        assert_eq!(result.outcome, StepOutcome::Success);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_daemon_reload_is_a_warning() {
        let config = ProvisioningConfig::default();
        let mut host = host().fail("systemctl daemon-reload");

        let result = apply(&config, &mut host).await;

        assert_eq!(result.outcome, StepOutcome::Success);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("daemon-reload"));
        assert!(host.ran("systemctl restart ssh"));
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/etc/ssh/sshd_config")),
            PathBuf::from("/etc/ssh/sshd_config.bak")
        );
    }
}
