//! Text rendering of skills and discovered server capabilities.

use std::fmt::Write as _;

use skillpool_core::{McpPromptInfo, McpResourceInfo, McpToolInfo, Skill, SkillSource};

/// Capabilities discovered on one server.
#[derive(Debug, Clone, Default)]
pub struct ServerDiscovery {
    pub tools: Vec<McpToolInfo>,
    pub resources: Vec<McpResourceInfo>,
    pub prompts: Vec<McpPromptInfo>,
    /// Listings that failed while the server itself answered, e.g.
    /// `"prompts unavailable: ..."`.
    pub notes: Vec<String>,
}

/// One declared server and what discovery found, or why it failed.
#[derive(Debug, Clone)]
pub struct ServerSection {
    pub server: String,
    pub discovery: Result<ServerDiscovery, String>,
}

/// Render a skill body followed by a section per declared server.
pub fn render_skill(skill: &Skill, sections: &[ServerSection]) -> String {
    let mut out = format!("# Skill: {}\n\n", skill.name);
    if let Some(description) = &skill.description {
        let _ = writeln!(out, "{description}\n");
    }
    out.push_str(skill.body.trim_end());
    out.push('\n');

    if sections.is_empty() {
        return out;
    }

    out.push_str("\n## MCP servers\n");
    for section in sections {
        let _ = writeln!(out, "\n### {}\n", section.server);
        match &section.discovery {
            Ok(discovery) => render_discovery(&mut out, &section.server, discovery),
            Err(message) => {
                let _ = writeln!(out, "[discovery failed: {message}]");
            }
        }
    }
    out
}

fn render_discovery(out: &mut String, server: &str, discovery: &ServerDiscovery) {
    if discovery.tools.is_empty() && discovery.resources.is_empty() && discovery.prompts.is_empty()
    {
        out.push_str("No tools, resources or prompts advertised.\n");
        render_notes(out, &discovery.notes);
        return;
    }

    if !discovery.tools.is_empty() {
        out.push_str("Tools:\n");
        for tool in &discovery.tools {
            render_tool(out, tool);
        }
    }

    if !discovery.resources.is_empty() {
        out.push_str("\nResources:\n");
        for resource in &discovery.resources {
            let _ = write!(out, "- {}", resource.uri);
            if let Some(name) = resource.name.as_deref().filter(|n| *n != resource.uri) {
                let _ = write!(out, " ({name})");
            }
            out.push('\n');
        }
    }

    if !discovery.prompts.is_empty() {
        out.push_str("\nPrompts:\n");
        for prompt in &discovery.prompts {
            let _ = write!(out, "- {}", prompt.name);
            if !prompt.arguments.is_empty() {
                let args: Vec<String> = prompt
                    .arguments
                    .iter()
                    .map(|arg| {
                        if arg.required {
                            arg.name.clone()
                        } else {
                            format!("{}?", arg.name)
                        }
                    })
                    .collect();
                let _ = write!(out, "({})", args.join(", "));
            }
            if let Some(description) = &prompt.description {
                let _ = write!(out, ": {description}");
            }
            out.push('\n');
        }
    }

    render_notes(out, &discovery.notes);

    let _ = writeln!(
        out,
        "\nCall these with the invoke tool and server_name \"{server}\"."
    );
}

fn render_notes(out: &mut String, notes: &[String]) {
    if notes.is_empty() {
        return;
    }
    out.push('\n');
    for note in notes {
        let _ = writeln!(out, "[{note}]");
    }
}

fn render_tool(out: &mut String, tool: &McpToolInfo) {
    let _ = write!(out, "- {}", tool.name);
    if let Some(description) = &tool.description {
        let _ = write!(out, ": {}", description.trim());
    }
    out.push('\n');

    if let Some(schema) = &tool.input_schema {
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        out.push_str("  Input schema:\n");
        for line in pretty.lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
}

/// One-line summary of a skill for listings.
pub fn render_skill_summary(skill: &Skill) -> String {
    let mut line = skill.name.clone();
    if let Some(description) = &skill.description {
        let _ = write!(line, " - {description}");
    }
    if skill.has_servers() {
        let servers: Vec<&str> = skill.mcp.keys().map(String::as_str).collect();
        let _ = write!(line, " [mcp: {}]", servers.join(", "));
    }
    if skill.source == SkillSource::User {
        line.push_str(" (user)");
    }
    line
}
