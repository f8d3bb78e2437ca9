//! Default skill locations.
//!
//! Project roots are relative to the working directory and take priority
//! over user roots in the home/config directory.

use std::path::{Path, PathBuf};

/// File name of a skill document.
pub const SKILL_DOCUMENT_FILE: &str = "SKILL.md";

/// File name of the sibling server configuration.
pub const SKILL_CONFIG_FILE: &str = "mcp.json";

/// Project-level skill roots below `cwd`, highest priority first.
pub fn project_skill_roots(cwd: &Path) -> Vec<PathBuf> {
    vec![
        cwd.join(".skillpool").join("skills"),
        cwd.join(".claude").join("skills"),
    ]
}

/// User-level skill roots, highest priority first.
///
/// Returns an empty list when neither a config nor a home directory is known.
pub fn user_skill_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(config) = dirs::config_dir() {
        roots.push(config.join("skillpool").join("skills"));
    }
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".claude").join("skills"));
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_roots_are_under_cwd() {
        let cwd = Path::new("/work/repo");
        let roots = project_skill_roots(cwd);
        assert_eq!(roots[0], PathBuf::from("/work/repo/.skillpool/skills"));
        assert!(roots.iter().all(|r| r.starts_with(cwd)));
    }
}
