// file: src/steps/firewall.rs
// version: 1.0.0
// guid: 9b3f7d20-e5a1-4c68-b0d4-2f8e6a1c5d97

//! Perimeter firewall step

use super::{StepContext, StepResult};
use crate::firewall::Ruleset;
use crate::Result;

const NAME: &str = "firewall";
const PERSISTENCE_PACKAGE: &str = "iptables-persistent";

/// Ruleset this config commits
pub fn planned_ruleset(ctx: &StepContext<'_>) -> Ruleset {
    Ruleset::perimeter(
        ctx.config.ssh_port,
        &ctx.config.extra_tcp_ports,
        &ctx.config.extra_udp_ports,
    )
}

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    ctx.packages
        .ensure_binary(ctx.host, "iptables", "iptables")
        .await?;

    let mut warnings = Vec::new();
    if !ctx
        .packages
        .is_installed(ctx.host, PERSISTENCE_PACKAGE)
        .await?
    {
        if let Err(e) = ctx.packages.install(ctx.host, &[PERSISTENCE_PACKAGE]).await {
            warnings.push(format!(
                "{} could not be installed; rules may not survive a reboot: {}",
                PERSISTENCE_PACKAGE, e
            ));
        }
    }

    let ruleset = planned_ruleset(ctx);
    let report = ctx.firewall.commit(ctx.host, &ruleset).await?;
    warnings.extend(report.warnings);

    let mut message = format!(
        "{} rules committed, INPUT policy DROP (ssh tcp/{})",
        report.ruleset.rules.len(),
        report.ruleset.ssh_port
    );
    if report.removed_stale > 0 {
        message.push_str(&format!("; removed {} stale tcp/22 accept(s)", report.removed_stale));
    }

    Ok(StepResult::success(NAME, message).with_warnings(warnings))
}
