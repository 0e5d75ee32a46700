// file: src/steps/mod.rs
// version: 2.0.0
// guid: 3c7d1a58-e24f-4b96-8a03-f5e9b2c6d741

//! Provisioning steps
//!
//! Each configurer is a variant of [`Step`] with the same capability: decide
//! whether it applies to a config, then apply it against the host and report a
//! [`StepResult`]. A step whose toggle is off is skipped without touching the
//! host; nothing a step does depends on whether another step was skipped,
//! except the username that user creation resolves for later steps.

pub mod ban_policy;
pub mod container;
pub mod directives;
pub mod firewall;
pub mod ssh;
pub mod tls;
pub mod tuning;
pub mod update;
pub mod user;

use crate::config::{HostPaths, ProvisioningConfig};
use crate::executor::CommandRunner;
use crate::firewall::FirewallEngine;
use crate::packages::PackageManager;
use crate::Result;
use serde::Serialize;
use std::fmt;
use tracing::{error, info, info_span, warn, Instrument};

/// Whether a failure of this step stops the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    NonFatal,
}

/// Final state of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepOutcome::Success => "success",
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Result of executing a provisioning step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: String,
    pub outcome: StepOutcome,
    pub severity: Severity,
    /// Human-readable detail: skip reason, failure diagnostic, or note
    pub message: Option<String>,
    /// Post-condition checks that failed although the action likely succeeded
    pub warnings: Vec<String>,
    /// Sub-steps reported separately, e.g. group membership
    pub details: Vec<StepResult>,
}

impl StepResult {
    pub fn success(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(step, StepOutcome::Success, Severity::NonFatal, Some(message.into()))
    }

    pub fn skipped(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(step, StepOutcome::Skipped, Severity::NonFatal, Some(reason.into()))
    }

    pub fn failed(step: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self::new(step, StepOutcome::Failed, severity, Some(message.into()))
    }

    fn new(step: impl Into<String>, outcome: StepOutcome, severity: Severity, message: Option<String>) -> Self {
        Self {
            step: step.into(),
            outcome,
            severity,
            message,
            warnings: Vec::new(),
            details: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        let warning = warning.into();
        warn!("{}: {}", self.step, warning);
        self.warnings.push(warning);
        self
    }

    pub fn with_warnings<I: IntoIterator<Item = String>>(mut self, warnings: I) -> Self {
        for warning in warnings {
            self = self.with_warning(warning);
        }
        self
    }

    pub fn with_detail(mut self, detail: StepResult) -> Self {
        self.details.push(detail);
        self
    }

    pub fn is_fatal_failure(&self) -> bool {
        self.outcome == StepOutcome::Failed && self.severity == Severity::Fatal
    }
}

/// Everything a step may use while applying itself
pub struct StepContext<'a> {
    pub config: &'a ProvisioningConfig,
    pub paths: &'a HostPaths,
    pub host: &'a mut dyn CommandRunner,
    pub packages: PackageManager,
    pub firewall: FirewallEngine,
    /// Account established by user creation, if any
    pub resolved_user: Option<String>,
}

impl<'a> StepContext<'a> {
    pub fn new(config: &'a ProvisioningConfig, paths: &'a HostPaths, host: &'a mut dyn CommandRunner) -> Self {
        Self {
            config,
            paths,
            host,
            packages: PackageManager::new(),
            firewall: FirewallEngine::new(paths.iptables_rules.clone()),
            resolved_user: None,
        }
    }
}

/// The provisioning steps, in no particular order; see [`crate::orchestrator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    SystemUpdate,
    CreateUser,
    SshHardening,
    BanPolicy,
    NetworkTuning,
    Firewall,
    ContainerRuntime,
    TlsIssuance,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::SystemUpdate => "system-update",
            Step::CreateUser => "create-user",
            Step::SshHardening => "ssh-hardening",
            Step::BanPolicy => "ban-policy",
            Step::NetworkTuning => "network-tuning",
            Step::Firewall => "firewall",
            Step::ContainerRuntime => "container-runtime",
            Step::TlsIssuance => "tls-issuance",
        }
    }

    /// Classification used when the step fails
    pub fn severity(&self) -> Severity {
        match self {
            Step::SystemUpdate | Step::SshHardening | Step::Firewall => Severity::Fatal,
            _ => Severity::NonFatal,
        }
    }

    pub fn applies(&self, config: &ProvisioningConfig) -> bool {
        match self {
            Step::SystemUpdate | Step::SshHardening | Step::Firewall => true,
            Step::CreateUser => config.toggles.create_user,
            Step::BanPolicy => config.toggles.ban_policy,
            Step::NetworkTuning => config.toggles.congestion_tuning,
            Step::ContainerRuntime => config.toggles.container_runtime,
            Step::TlsIssuance => config.toggles.tls,
        }
    }

    /// Why the step is skipped when it does not apply
    pub fn skip_reason(&self) -> &'static str {
        match self {
            Step::CreateUser => "user creation disabled",
            Step::BanPolicy => "ban policy disabled",
            Step::NetworkTuning => "congestion tuning disabled",
            Step::ContainerRuntime => "container runtime disabled",
            Step::TlsIssuance => "TLS issuance disabled",
            _ => "not applicable",
        }
    }

    /// Apply the step, folding any error into a failed result
    pub async fn apply(&self, ctx: &mut StepContext<'_>) -> StepResult {
        if !self.applies(ctx.config) {
            info!("Skipping {}: {}", self.name(), self.skip_reason());
            return StepResult::skipped(self.name(), self.skip_reason());
        }

        info!("Starting {}", self.name());
        let span = info_span!("step", name = self.name());
        let result: Result<StepResult> = async {
            match self {
                Step::SystemUpdate => update::run(ctx).await,
                Step::CreateUser => user::run(ctx).await,
                Step::SshHardening => ssh::run(ctx).await,
                Step::BanPolicy => ban_policy::run(ctx).await,
                Step::NetworkTuning => tuning::run(ctx).await,
                Step::Firewall => firewall::run(ctx).await,
                Step::ContainerRuntime => container::run(ctx).await,
                Step::TlsIssuance => tls::run(ctx).await,
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(result) => {
                info!("{} finished: {}", self.name(), result.outcome);
                result
            }
            Err(e) => {
                let severity = if e.is_execution() { Severity::Fatal } else { self.severity() };
                error!("{} failed ({:?}): {}", self.name(), severity, e);
                StepResult::failed(self.name(), severity, e.to_string())
            }
        }
    }
}
