//! Skill command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Print a skill with its servers' discovered capabilities.
pub async fn execute(ctx: &CliContext, name: &str) -> Result<()> {
    let text = ctx
        .skill_tool
        .execute(name, &ctx.session)
        .await
        .map_err(CliError::from)?;
    println!("{text}");
    Ok(())
}
