// file: src/steps/tuning.rs
// version: 1.0.0
// guid: c6e04b8a-17f3-4d29-a5c1-9b2d8e3f7a40

//! TCP congestion control tuning (fq + BBR)

use super::{StepContext, StepResult};
use crate::executor::HostCommand;
use crate::Result;
use tracing::{debug, info};

const NAME: &str = "network-tuning";

/// Settings appended to sysctl.conf when absent
pub const SETTINGS: [&str; 2] = [
    "net.core.default_qdisc=fq",
    "net.ipv4.tcp_congestion_control=bbr",
];

/// Append each missing setting; returns the new content and how many were added
pub fn append_missing(existing: &str) -> (String, usize) {
    let mut content = existing.to_string();
    let mut added = 0;
    for setting in SETTINGS {
        if existing.contains(setting) {
            debug!("{} already present", setting);
            continue;
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(setting);
        content.push('\n');
        added += 1;
    }
    (content, added)
}

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    let path = ctx.paths.sysctl_conf.clone();
    let existing = ctx.host.read_file(&path).await?.unwrap_or_default();

    let (content, added) = append_missing(&existing);
    if added > 0 {
        ctx.host.write_file(&path, &content).await?;
        info!("Appended {} setting(s) to {}", added, path.display());
    }

    ctx.host
        .run_checked(&HostCommand::new("sysctl").args(["-p", path.display().to_string().as_str()]))
        .await?;

    let active = ctx
        .host
        .run(&HostCommand::new("sysctl").args(["-n", "net.ipv4.tcp_congestion_control"]))
        .await?;
    let reported = active.stdout.trim().to_string();

    let result = StepResult::success(NAME, "fq queueing and BBR congestion control configured");
    if active.is_success() && reported == "bbr" {
        return Ok(result);
    }

    let shown = if reported.is_empty() { "nothing" } else { reported.as_str() };
    Ok(result.with_warning(format!(
        "kernel reports congestion control '{}' instead of bbr; the module may be unavailable",
        shown
    )))
}
