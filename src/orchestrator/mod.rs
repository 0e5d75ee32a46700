// file: src/orchestrator/mod.rs
// version: 1.0.0
// guid: 7c1e5d92-a8f4-4b36-9d05-e4b2a7f1c8d3

//! Fixed-order provisioning run

pub mod summary;

pub use summary::RunSummary;

use crate::steps::{Step, StepContext, StepResult};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

/// Execution order of every step
pub const ORDER: [Step; 8] = [
    Step::SystemUpdate,
    Step::CreateUser,
    Step::SshHardening,
    Step::BanPolicy,
    Step::NetworkTuning,
    Step::Firewall,
    Step::ContainerRuntime,
    Step::TlsIssuance,
];

/// Runs steps in order, stopping at the first fatal failure
#[derive(Debug, Clone)]
pub struct Orchestrator {
    steps: Vec<Step>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            steps: ORDER.to_vec(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Drive every step against the context's host
    pub async fn run(&self, ctx: &mut StepContext<'_>) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting provisioning run {}", run_id);

        let mut results = Vec::with_capacity(self.steps.len());
        let mut aborted_after: Option<&'static str> = None;

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(failed) = aborted_after {
                results.push(StepResult::skipped(
                    step.name(),
                    format!("not run: aborted after {}", failed),
                ));
                continue;
            }

            info!("Executing step {}/{}: {}", index + 1, self.steps.len(), step.name());
            let result = step.apply(ctx).await;
            if result.is_fatal_failure() {
                error!("Fatal failure in {}; remaining steps will not run", step.name());
                aborted_after = Some(step.name());
            }
            results.push(result);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            ssh_port: ctx.config.ssh_port,
            user: ctx.resolved_user.clone(),
            results,
            aborted_after: aborted_after.map(str::to_string),
        };

        if summary.is_success() {
            info!("Provisioning run {} completed", run_id);
        } else {
            error!("Provisioning run {} aborted", run_id);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostPaths, ProvisioningConfig};
    use crate::executor::RecordingHost;
    use crate::steps::StepOutcome;

    #[test]
    fn test_order_is_fixed() {
        let names: Vec<&str> = Orchestrator::new().steps().iter().map(Step::name).collect();

        assert_eq!(
            names,
            vec![
                "system-update",
                "create-user",
                "ssh-hardening",
                "ban-policy",
                "network-tuning",
                "firewall",
                "container-runtime",
                "tls-issuance",
            ]
        );
    }

    #[tokio::test]
    async fn test_fatal_failure_aborts_remaining_steps() {
        // Arrange
        let config = ProvisioningConfig::default();
        let paths = HostPaths::default();
        let mut host = RecordingHost::new().fail("apt-get update");

        // Act
        let summary = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Orchestrator::new().run(&mut ctx).await
        };

        // Assert
        assert!(!summary.is_success());
        assert_eq!(summary.aborted_after.as_deref(), Some("system-update"));
        assert_eq!(summary.results.len(), 8);
        assert_eq!(summary.results[0].outcome, StepOutcome::Failed);
        for result in &summary.results[1..] {
            assert_eq!(result.outcome, StepOutcome::Skipped);
            assert_eq!(
                result.message.as_deref(),
                Some("not run: aborted after system-update")
            );
        }
        assert_eq!(host.commands(), vec!["apt-get update"]);
    }

    #[tokio::test]
    async fn test_non_fatal_failure_continues() {
        // Arrange
        let mut config = ProvisioningConfig::default();
        config.toggles.ban_policy = true;
        config.toggles.congestion_tuning = true;
        let paths = HostPaths::default();
        let mut host = RecordingHost::new()
            .with_file("/etc/ssh/sshd_config", "UsePAM yes\n")
            .fail("systemctl restart fail2ban");

        // Act
        let summary = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Orchestrator::new().run(&mut ctx).await
        };

        // Assert
        assert!(summary.is_success());
        let ban = summary.result("ban-policy").unwrap();
        assert_eq!(ban.outcome, StepOutcome::Failed);
        assert!(!ban.is_fatal_failure());
        assert_eq!(summary.result("network-tuning").unwrap().outcome, StepOutcome::Success);
        assert!(host.ran("sysctl -p"));
        assert!(host.ran("iptables -P INPUT DROP"));
    }

    #[tokio::test]
    async fn test_ssh_failure_prevents_firewall() {
        let config = ProvisioningConfig::default();
        let paths = HostPaths::default();
        let mut host = RecordingHost::new();

        let summary = {
            let mut ctx = StepContext::new(&config, &paths, &mut host);
            Orchestrator::new().run(&mut ctx).await
        };

        // No sshd_config on this host
        assert_eq!(summary.aborted_after.as_deref(), Some("ssh-hardening"));
        assert!(!host.ran("iptables"));
    }
}
