//! `SKILL.md` front matter.
//!
//! A document may start with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! name: triage
//! description: Triage GitHub issues
//! mcp:
//!   github:
//!     command: ["npx", "-y", "@modelcontextprotocol/server-github"]
//!     env:
//!       GITHUB_TOKEN: ${GITHUB_TOKEN}
//! ---
//! # Body
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;
use skillpool_core::ServerConfig;

/// Recognized front-matter keys. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "mcpServers")]
    pub mcp: BTreeMap<String, ServerConfig>,
}

/// A parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDocument {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// Parse a skill document.
///
/// A document without an opening fence is all body. An opening fence
/// without a closing one is an error.
pub fn parse_document(content: &str) -> Result<SkillDocument, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let Some((yaml, body)) = split_front_matter(content)? else {
        return Ok(SkillDocument {
            front_matter: FrontMatter::default(),
            body: content.trim().to_string(),
        });
    };

    let front_matter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse YAML: {e}"))?
    };

    Ok(SkillDocument {
        front_matter,
        body: body.trim().to_string(),
    })
}

fn split_front_matter(content: &str) -> Result<Option<(&str, &str)>, String> {
    let Some(rest) = content.strip_prefix("---") else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        // `----` or `--- text` is a horizontal rule or prose, not a fence.
        return Ok(None);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Ok(Some((&rest[..offset], &rest[offset + line.len()..])));
        }
        offset += line.len();
    }

    Err("Missing closing --- delimiter".to_string())
}
