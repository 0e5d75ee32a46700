// file: src/packages.rs
// version: 2.0.0
// guid: d3a81f6e-4b5c-47a0-9e28-1c7b60f4d952

//! Package management through apt

use crate::executor::{CommandOutcome, CommandRunner, HostCommand};
use crate::Result;
use tracing::info;

/// Thin wrapper over `apt-get`/`dpkg`; the package manager is an opaque collaborator
#[derive(Debug, Clone, Default)]
pub struct PackageManager;

impl PackageManager {
    pub fn new() -> Self {
        Self
    }

    fn apt_get(&self) -> HostCommand {
        HostCommand::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
    }

    /// Refresh package lists
    pub async fn update(&self, host: &mut dyn CommandRunner) -> Result<CommandOutcome> {
        info!("Refreshing package lists");
        host.run_checked(&self.apt_get().arg("update")).await
    }

    /// Upgrade installed packages, keeping existing config files on conflict
    pub async fn upgrade(&self, host: &mut dyn CommandRunner) -> Result<CommandOutcome> {
        info!("Upgrading installed packages");
        let cmd = self.apt_get().args([
            "-y",
            "-o",
            "Dpkg::Options::=--force-confold",
            "upgrade",
        ]);
        host.run_checked(&cmd).await
    }

    /// Install packages non-interactively
    pub async fn install(&self, host: &mut dyn CommandRunner, packages: &[&str]) -> Result<CommandOutcome> {
        info!("Installing packages: {}", packages.join(" "));
        let cmd = self.apt_get().args(["install", "-y"]).args(packages.iter().copied());
        host.run_checked(&cmd).await
    }

    /// Whether a package is installed according to dpkg
    pub async fn is_installed(&self, host: &mut dyn CommandRunner, package: &str) -> Result<bool> {
        host.probe(&HostCommand::new("dpkg").args(["-s", package]))
            .await
    }

    /// Install `package` unless `binary` is already on PATH
    pub async fn ensure_binary(
        &self,
        host: &mut dyn CommandRunner,
        binary: &str,
        package: &str,
    ) -> Result<bool> {
        if host.binary_exists(binary).await? {
            return Ok(false);
        }
        self.install(host, &[package]).await?;
        Ok(true)
    }
}
