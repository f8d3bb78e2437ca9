//! Servers command handler.

use std::fmt::Write as _;

use anyhow::Result;
use skillpool_core::{ServerConfig, SkillCatalog};
use skillpool_mcp::normalize_command;

use crate::bootstrap::CliContext;

/// Print every declared server with its owning skill and launch command.
///
/// Environment values are not expanded, so secrets stay as placeholders.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let skills = ctx.registry.list().await;
    let rows: Vec<(&str, &str, &ServerConfig)> = skills
        .iter()
        .flat_map(|skill| {
            skill
                .mcp
                .iter()
                .map(|(server, config)| (server.as_str(), skill.name.as_str(), config))
        })
        .collect();

    if rows.is_empty() {
        println!("No MCP servers declared by discovered skills.");
        return Ok(());
    }

    print!("{}", format_servers(&rows));
    Ok(())
}

/// One line per server: name, owning skill, launch command.
pub fn format_servers(rows: &[(&str, &str, &ServerConfig)]) -> String {
    let width = rows.iter().map(|(server, _, _)| server.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (server, skill, config) in rows {
        let command = match normalize_command(config) {
            Ok(spec) => spec.display(),
            Err(e) => format!("[{e}]"),
        };
        let _ = writeln!(out, "{server:<width$}  {skill}  {command}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_servers() {
        let github = ServerConfig::from_argv(["npx", "-y", "gh-server"]);
        let broken = ServerConfig::default();
        let text = format_servers(&[
            ("github", "triage", &github),
            ("db", "ops", &broken),
        ]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "github  triage  npx -y gh-server");
        assert!(lines[1].starts_with("db      ops  [Invalid MCP server configuration"));
    }
}
