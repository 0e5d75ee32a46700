// file: src/steps/container.rs
// version: 1.0.0
// guid: 4f8a1c63-b92e-47d5-8e07-a3c6d1f9b254

//! Docker engine and compose plugin installation

use super::{StepContext, StepResult};
use crate::executor::HostCommand;
use crate::Result;
use tracing::info;

const NAME: &str = "container-runtime";
const GROUP_DETAIL: &str = "docker-group";
const INSTALL_SCRIPT_URL: &str = "https://get.docker.com";
const INSTALL_SCRIPT_PATH: &str = "/tmp/get-docker.sh";

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    if ctx.host.binary_exists("docker").await? {
        info!("docker already installed");
        return Ok(StepResult::skipped(NAME, "docker already installed"));
    }

    ctx.host
        .run_checked(&HostCommand::new("curl").args([
            "-fsSL",
            INSTALL_SCRIPT_URL,
            "-o",
            INSTALL_SCRIPT_PATH,
        ]))
        .await?;
    ctx.host
        .run_checked(&HostCommand::new("sh").arg(INSTALL_SCRIPT_PATH))
        .await?;
    info!("Docker engine installed");

    let compose = HostCommand::new("docker").args(["compose", "version"]);
    if !ctx.host.probe(&compose).await? {
        ctx.packages
            .install(ctx.host, &["docker-compose-plugin"])
            .await?;
    }

    let group = match ctx.resolved_user.clone() {
        Some(user) => {
            ctx.host
                .run_checked(&HostCommand::new("usermod").args(["-aG", "docker", user.as_str()]))
                .await?;
            StepResult::success(GROUP_DETAIL, format!("{} added to docker group", user))
        }
        None => StepResult::skipped(GROUP_DETAIL, "no username resolved"),
    };

    Ok(StepResult::success(NAME, "docker engine and compose plugin installed").with_detail(group))
}

#[cfg(test)]
mod tests {
    use super::super::{Step, StepOutcome};
    use super::*;
    use crate::config::{HostPaths, ProvisioningConfig};
    use crate::executor::RecordingHost;

    fn config() -> ProvisioningConfig {
        let mut config = ProvisioningConfig::default();
        config.toggles.container_runtime = true;
        config
    }

    fn missing_docker() -> RecordingHost {
        RecordingHost::new().fail("sh -c 'command -v docker'")
    }

    #[tokio::test]
    async fn test_existing_docker_skips_step() {
        let config = config();
        let paths = HostPaths::default();
        let mut host = RecordingHost::new();

        let result = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Step::ContainerRuntime.apply(&mut ctx).await
        };

        assert_eq!(result.outcome, StepOutcome::Skipped);
        assert!(!host.ran("curl"));
    }

    #[tokio::test]
    async fn test_no_user_skips_group_membership() {
        // Arrange
        let config = config();
        let paths = HostPaths::default();
        let mut host = missing_docker();

        // Act
        let result = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Step::ContainerRuntime.apply(&mut ctx).await
        };

        // Assert
        assert_eq!(result.outcome, StepOutcome::Success);
        assert_eq!(result.details.len(), 1);
        assert_eq!(result.details[0].outcome, StepOutcome::Skipped);
        assert_eq!(result.details[0].message.as_deref(), Some("no username resolved"));
        assert!(host.ran("sh /tmp/get-docker.sh"));
        assert!(!host.ran("usermod"));
    }

    #[tokio::test]
    async fn test_resolved_user_joins_docker_group() {
        let config = config();
        let paths = HostPaths::default();
        let mut host = missing_docker();

        let result = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            ctx.resolved_user = Some("deploy".to_string());
            Step::ContainerRuntime.apply(&mut ctx).await
        };

        assert_eq!(result.details[0].outcome, StepOutcome::Success);
        assert!(host.ran("usermod -aG docker deploy"));
    }

    #[tokio::test]
    async fn test_missing_compose_plugin_is_installed() {
        let config = config();
        let paths = HostPaths::default();
        let mut host = missing_docker().fail("docker compose version");

        let result = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Step::ContainerRuntime.apply(&mut ctx).await
        };

        assert_eq!(result.outcome, StepOutcome::Success);
        assert!(host.ran("apt-get install -y docker-compose-plugin"));
    }

    #[tokio::test]
    async fn test_download_failure_is_non_fatal() {
        let config = config();
        let paths = HostPaths::default();
        let mut host = missing_docker().fail("curl");

        let result = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Step::ContainerRuntime.apply(&mut ctx).await
        };

        assert_eq!(result.outcome, StepOutcome::Failed);
        assert!(!result.is_fatal_failure());
    }
}
