// file: src/steps/user.rs
// version: 1.0.0
// guid: f1a6c3d8-2b94-4e05-8c7a-d53e9b0f1c26

//! Administrative user creation

use super::{StepContext, StepResult};
use crate::error::ProvisionError;
use crate::executor::HostCommand;
use crate::Result;
use tracing::info;

const NAME: &str = "create-user";

/// Create the sudo-capable account, or adopt it if it already exists
pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    let user = ctx
        .config
        .user
        .clone()
        .ok_or_else(|| ProvisionError::config("user creation enabled without a username"))?;

    if ctx
        .host
        .probe(&HostCommand::new("id").args(["-u", user.as_str()]))
        .await?
    {
        info!("User {} already exists", user);
        ctx.resolved_user = Some(user.clone());
        return Ok(StepResult::success(
            NAME,
            format!("user {} already exists; creation skipped", user),
        ));
    }

    ctx.host
        .run_checked(&HostCommand::new("adduser").args([
            "--disabled-password",
            "--gecos",
            "",
            user.as_str(),
        ]))
        .await?;
    ctx.host
        .run_checked(&HostCommand::new("usermod").args(["-aG", "sudo", user.as_str()]))
        .await?;
    ctx.resolved_user = Some(user.clone());

    let mut result = StepResult::success(NAME, format!("created {} with sudo membership", user));

    let root_keys = ctx.host.read_file(&ctx.paths.root_authorized_keys).await?;
    match root_keys.filter(|keys| !keys.trim().is_empty()) {
        Some(keys) => {
            let target = ctx.paths.user_authorized_keys(&user);
            ctx.host.write_file(&target, &keys).await?;
            if let Some(ssh_dir) = target.parent() {
                let ssh_dir = ssh_dir.display().to_string();
                ctx.host
                    .run_checked(&HostCommand::new("chmod").args(["700", ssh_dir.as_str()]))
                    .await?;
                ctx.host
                    .run_checked(&HostCommand::new("chown").args([
                        "-R",
                        format!("{0}:{0}", user).as_str(),
                        ssh_dir.as_str(),
                    ]))
                    .await?;
            }
            ctx.host
                .run_checked(
                    &HostCommand::new("chmod").args(["600", target.display().to_string().as_str()]),
                )
                .await?;
            info!("Copied root's authorized_keys to {}", user);
        }
        None => {
            result = result.with_warning(format!(
                "root has no authorized_keys; install a key for {} before closing this session",
                user
            ));
        }
    }

    Ok(result)
}
