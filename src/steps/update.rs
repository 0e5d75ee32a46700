// file: src/steps/update.rs
// version: 1.0.0
// guid: 8d2f5b19-c04a-4e71-a3b6-0f9e7d4c2a85

//! System package update

use super::{StepContext, StepResult};
use crate::Result;

pub async fn run(ctx: &mut StepContext<'_>) -> Result<StepResult> {
    ctx.packages.update(ctx.host).await?;
    ctx.packages.upgrade(ctx.host).await?;
    Ok(StepResult::success("system-update", "package lists refreshed and packages upgraded"))
}
