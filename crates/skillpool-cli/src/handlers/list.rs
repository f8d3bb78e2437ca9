//! List command handler.

use anyhow::Result;
use skillpool_core::SkillCatalog;
use skillpool_skills::render_skill_summary;

use crate::bootstrap::CliContext;

/// Print one line per discovered skill.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let skills = ctx.registry.list().await;

    if skills.is_empty() {
        println!("No skills found.");
        println!("Searched:");
        for root in ctx.registry.roots() {
            println!("  {}", root.path.display());
        }
        return Ok(());
    }

    println!("Found {} skill(s):\n", skills.len());
    for skill in &skills {
        println!("  {}", render_skill_summary(skill));
    }
    Ok(())
}
