//! Skill domain types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::mcp::ServerConfig;

/// Where a skill was discovered. Project skills shadow user skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    Project,
    User,
}

/// A discovered skill document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Unique name (front-matter `name`, or the directory name).
    pub name: String,
    /// One-line summary from front matter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Document text after the front matter.
    pub body: String,
    /// Path of the `SKILL.md` file.
    pub path: PathBuf,
    pub source: SkillSource,
    /// Declared MCP servers, keyed by server name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp: BTreeMap<String, ServerConfig>,
}

impl Skill {
    /// Whether the skill bundles any MCP servers.
    pub fn has_servers(&self) -> bool {
        !self.mcp.is_empty()
    }

    /// Look up a declared server by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.mcp.get(name)
    }
}
