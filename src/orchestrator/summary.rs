// file: src/orchestrator/summary.rs
// version: 1.1.0
// guid: 0a6f3b8e-c57d-4921-b8e4-d19c6a2f7e50

//! Run summary and JSON report

use crate::steps::{StepOutcome, StepResult};
use crate::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

/// Every step's result for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ssh_port: u16,
    /// Account resolved by user creation
    pub user: Option<String>,
    pub results: Vec<StepResult>,
    /// Step whose fatal failure stopped the run
    pub aborted_after: Option<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.aborted_after.is_none()
    }

    pub fn result(&self, step: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step == step)
    }

    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn warning_count(&self) -> usize {
        self.results
            .iter()
            .map(|r| r.warnings.len() + r.details.iter().map(|d| d.warnings.len()).sum::<usize>())
            .sum()
    }

    /// Terminal rendering
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "Provisioning summary".bold());

        for result in &self.results {
            render_line(&mut out, result, 2);
            for detail in &result.details {
                render_line(&mut out, detail, 6);
            }
        }

        let _ = writeln!(
            out,
            "\n{} succeeded, {} skipped, {} failed, {} warning(s)",
            self.count(StepOutcome::Success),
            self.count(StepOutcome::Skipped),
            self.count(StepOutcome::Failed),
            self.warning_count()
        );

        if self.result("firewall").map(|r| r.outcome) == Some(StepOutcome::Success) {
            let _ = writeln!(
                out,
                "{}",
                "Firewall rules cover IPv4 only; IPv6 traffic is not filtered".yellow()
            );
        }

        match &self.aborted_after {
            Some(step) => {
                let _ = writeln!(out, "{}", format!("Run aborted after {}", step).red().bold());
            }
            None => {
                let login = match &self.user {
                    Some(user) => format!("ssh -p {} {}@<host>", self.ssh_port, user),
                    None => format!("ssh -p {} <user>@<host>", self.ssh_port),
                };
                let _ = writeln!(
                    out,
                    "{}",
                    format!("Verify a new session ({}) before closing this one", login).yellow()
                );
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON report to a local path
    pub async fn write_report(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()?).await?;
        info!("Run report written to {}", path.display());
        Ok(())
    }
}

fn render_line(out: &mut String, result: &StepResult, indent: usize) {
    let status = match result.outcome {
        StepOutcome::Success => "ok".green(),
        StepOutcome::Skipped => "skip".dimmed(),
        StepOutcome::Failed => "FAIL".red().bold(),
    };
    let message = result.message.as_deref().unwrap_or("");
    let _ = writeln!(
        out,
        "{:indent$}[{:>4}] {:<18} {}",
        "",
        status,
        result.step,
        message,
        indent = indent
    );
    for warning in &result.warnings {
        let _ = writeln!(out, "{:indent$}  {} {}", "", "warning:".yellow(), warning, indent = indent + 7);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::Severity;

    fn summary(aborted_after: Option<&str>) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            ssh_port: 2222,
            user: Some("deploy".to_string()),
            results: vec![
                StepResult::success("system-update", "done"),
                StepResult::failed("ban-policy", Severity::NonFatal, "restart failed"),
                StepResult::success("network-tuning", "bbr").with_warning("kernel reports cubic"),
                StepResult::skipped("tls-issuance", "TLS issuance disabled"),
            ],
            aborted_after: aborted_after.map(str::to_string),
        }
    }

    #[test]
    fn test_counts() {
        let summary = summary(None);

        assert!(summary.is_success());
        assert_eq!(summary.count(StepOutcome::Success), 2);
        assert_eq!(summary.count(StepOutcome::Failed), 1);
        assert_eq!(summary.warning_count(), 1);
    }

    #[test]
    fn test_render_mentions_every_step() {
        colored::control::set_override(false);
        let rendered = summary(None).render();

        for step in ["system-update", "ban-policy", "network-tuning", "tls-issuance"] {
            assert!(rendered.contains(step), "missing {}", step);
        }
        assert!(rendered.contains("ssh -p 2222 deploy@<host>"));
    }

    #[test]
    fn test_render_notes_ipv4_only_firewall() {
        colored::control::set_override(false);
        let mut with_firewall = summary(None);
        with_firewall.results.push(StepResult::success("firewall", "9 rules"));

        let rendered = with_firewall.render();

        assert!(rendered.contains("IPv6 traffic is not filtered"));
        assert!(!summary(None).render().contains("IPv6"));
    }

    #[test]
    fn test_render_aborted() {
        colored::control::set_override(false);
        let rendered = summary(Some("firewall")).render();

        assert!(rendered.contains("Run aborted after firewall"));
    }

    #[tokio::test]
    async fn test_write_report() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");

        // Act
        summary(None).write_report(&path).await.unwrap();

        // Assert
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["ssh_port"], 2222);
        assert_eq!(json["results"][1]["outcome"], "failed");
        assert_eq!(json["results"][1]["severity"], "non_fatal");
    }
}
