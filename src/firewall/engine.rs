// file: src/firewall/engine.rs
// version: 1.1.0
// guid: a07c4e93-6d2b-4f18-b5e9-38f1d0c7a6e2

//! iptables-backed firewall engine

use super::{Chain, FirewallRule, Ruleset};
use crate::executor::{CommandRunner, HostCommand};
use crate::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const LEGACY_SSH_PORT: u16 = 22;

/// Outcome of a full ruleset commit
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub ruleset: Ruleset,
    /// Whether the active rules were written to the persistence file
    pub persisted: bool,
    /// Leftover tcp/22 accept rules deleted before the drop policy
    pub removed_stale: usize,
    pub warnings: Vec<String>,
}

/// Builds and mutates the host's IPv4 filter table
#[derive(Debug, Clone)]
pub struct FirewallEngine {
    binary: String,
    save_binary: String,
    rules_path: PathBuf,
}

impl FirewallEngine {
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: "iptables".to_string(),
            save_binary: "iptables-save".to_string(),
            rules_path: rules_path.into(),
        }
    }

    fn iptables(&self) -> HostCommand {
        HostCommand::new(&self.binary)
    }

    /// Rebuild the filter table from scratch.
    ///
    /// Default policies stay ACCEPT until every allow rule is in place, so an
    /// error part-way through leaves the host reachable. INPUT switches to DROP
    /// only after the SSH accept rule exists.
    pub async fn commit(&self, host: &mut dyn CommandRunner, ruleset: &Ruleset) -> Result<CommitReport> {
        info!(
            "Committing firewall ruleset ({} rules, ssh port {})",
            ruleset.rules.len(),
            ruleset.ssh_port
        );

        for flag in ["-F", "-X", "-Z"] {
            host.run_checked(&self.iptables().arg(flag)).await?;
        }

        for chain in Chain::ALL {
            self.set_policy(host, chain, "ACCEPT").await?;
        }

        for rule in &ruleset.rules {
            for (chain, spec) in rule.specs() {
                debug!("Appending {} to {}", rule, chain.as_str());
                host.run_checked(&self.iptables().args(["-A", chain.as_str()]).args(spec))
                    .await?;
            }
        }

        let removed_stale = if ruleset.rules.contains(&FirewallRule::allow_tcp(LEGACY_SSH_PORT)) {
            0
        } else {
            self.purge_port_accepts(host, LEGACY_SSH_PORT).await?
        };

        self.set_policy(host, Chain::Input, "DROP").await?;
        info!("Default INPUT policy is now DROP");

        let mut warnings = Vec::new();
        let persisted = match self.persist(host).await {
            Ok(()) => true,
            Err(e) => {
                let message = format!(
                    "Rules are active but were not persisted to {}: {}",
                    self.rules_path.display(),
                    e
                );
                warn!("{}", message);
                warnings.push(message);
                false
            }
        };

        Ok(CommitReport {
            ruleset: ruleset.clone(),
            persisted,
            removed_stale,
            warnings,
        })
    }

    /// Append a single rule to the committed policy unless it already exists.
    /// Returns whether anything was inserted.
    pub async fn allow(&self, host: &mut dyn CommandRunner, rule: &FirewallRule) -> Result<bool> {
        let mut inserted = false;
        for (chain, spec) in rule.specs() {
            if self.exists(host, chain, &spec).await? {
                debug!("{} already present in {}", rule, chain.as_str());
                continue;
            }
            host.run_checked(&self.iptables().args(["-A", chain.as_str()]).args(spec))
                .await?;
            inserted = true;
        }

        if inserted {
            info!("Firewall: allowed {}", rule);
        }
        Ok(inserted)
    }

    /// Delete a single rule from the committed policy if present.
    /// Returns whether anything was removed.
    pub async fn revoke(&self, host: &mut dyn CommandRunner, rule: &FirewallRule) -> Result<bool> {
        let mut removed = false;
        for (chain, spec) in rule.specs() {
            if !self.exists(host, chain, &spec).await? {
                continue;
            }
            host.run_checked(&self.iptables().args(["-D", chain.as_str()]).args(spec))
                .await?;
            removed = true;
        }

        if removed {
            info!("Firewall: revoked {}", rule);
        }
        Ok(removed)
    }

    /// Write the active rules to the persistence file
    pub async fn persist(&self, host: &mut dyn CommandRunner) -> Result<()> {
        let saved = host
            .run_checked(&HostCommand::new(&self.save_binary))
            .await?;
        host.write_file(&self.rules_path, &saved.stdout).await?;
        info!("Firewall rules persisted to {}", self.rules_path.display());
        Ok(())
    }

    async fn set_policy(&self, host: &mut dyn CommandRunner, chain: Chain, target: &str) -> Result<()> {
        host.run_checked(&self.iptables().args(["-P", chain.as_str(), target]))
            .await?;
        Ok(())
    }

    async fn exists(&self, host: &mut dyn CommandRunner, chain: Chain, spec: &[String]) -> Result<bool> {
        host.probe(
            &self
                .iptables()
                .args(["-C", chain.as_str()])
                .args(spec.iter().cloned()),
        )
        .await
    }

    /// Delete every INPUT tcp accept rule for `port` reported by `iptables -S`
    async fn purge_port_accepts(&self, host: &mut dyn CommandRunner, port: u16) -> Result<usize> {
        let listing = host
            .run_checked(&self.iptables().args(["-S", Chain::Input.as_str()]))
            .await?;

        let stale: Vec<Vec<String>> = listing
            .stdout
            .lines()
            .filter_map(|line| accept_rule_for_port(line, port))
            .collect();

        for spec in &stale {
            warn!("Removing leftover accept rule for port {}: {}", port, spec.join(" "));
            host.run_checked(&self.iptables().args(["-D", Chain::Input.as_str()]).args(spec.iter().cloned()))
                .await?;
        }

        Ok(stale.len())
    }
}

/// Parse one `iptables -S` line; returns the rule spec if it accepts tcp `port`
fn accept_rule_for_port(line: &str, port: u16) -> Option<Vec<String>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 || tokens[0] != "-A" || tokens[1] != Chain::Input.as_str() {
        return None;
    }

    let value_after = |flag: &str| {
        tokens
            .windows(2)
            .find(|pair| pair[0] == flag)
            .map(|pair| pair[1])
    };

    let port_text = port.to_string();
    let is_tcp = value_after("-p") == Some("tcp");
    let matches_port = value_after("--dport") == Some(port_text.as_str());
    let accepts = value_after("-j") == Some("ACCEPT");

    if is_tcp && matches_port && accepts {
        Some(tokens[2..].iter().map(|t| t.to_string()).collect())
    } else {
        None
    }
}
