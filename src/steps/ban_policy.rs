// file: src/steps/ban_policy.rs
// version: 1.0.0
// guid: 5a9c2e71-d3b8-4f06-91a4-e7c05b8d3f12

//! fail2ban jail for sshd

use super::{StepContext, StepResult};
use crate::config::BanPolicy;
use crate::executor::HostCommand;
use crate::Result;
use tracing::info;

const NAME: &str = "ban-policy";

/// Render the sshd jail override
pub fn render_jail(ssh_port: u16, policy: &BanPolicy) -> String {
    format!(
        "[sshd]\nenabled = true\nport = {}\nmaxretry = {}\nbantime = {}\nfindtime = {}\n",
        ssh_port, policy.max_retry, policy.ban_time_secs, policy.find_time_secs
    )
}

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    let policy = ctx.config.ban_policy.unwrap_or_default();

    let installed = ctx
        .packages
        .ensure_binary(ctx.host, "fail2ban-client", "fail2ban")
        .await?;

    let jail = render_jail(ctx.config.ssh_port, &policy);
    ctx.host.write_file(&ctx.paths.fail2ban_jail, &jail).await?;
    info!("Wrote sshd jail to {}", ctx.paths.fail2ban_jail.display());

    ctx.host
        .run_checked(&HostCommand::new("systemctl").args(["enable", "fail2ban"]))
        .await?;
    ctx.host
        .run_checked(&HostCommand::new("systemctl").args(["restart", "fail2ban"]))
        .await?;

    let verb = if installed { "installed" } else { "configured" };
    Ok(StepResult::success(
        NAME,
        format!(
            "fail2ban {}: sshd port {}, maxretry {}, bantime {}s",
            verb, ctx.config.ssh_port, policy.max_retry, policy.ban_time_secs
        ),
    ))
}
