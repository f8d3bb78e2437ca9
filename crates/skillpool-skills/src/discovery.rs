//! Skill discovery.
//!
//! Walks each skill root for `SKILL.md` documents. Roots are searched in
//! priority order and the first skill seen for a name wins, so project
//! skills shadow user skills.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use skillpool_core::{
    SKILL_CONFIG_FILE, SKILL_DOCUMENT_FILE, Settings, Skill, SkillSource, project_skill_roots,
    user_skill_roots,
};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::parse_server_file;
use crate::error::SkillError;
use crate::frontmatter::parse_document;

/// A directory searched for skills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRoot {
    pub path: PathBuf,
    pub source: SkillSource,
}

impl SkillRoot {
    pub fn new(path: impl Into<PathBuf>, source: SkillSource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Default roots for `cwd`, highest priority first.
///
/// Extra directories from settings come first and count as project roots.
pub fn default_roots(cwd: &Path, settings: &Settings) -> Vec<SkillRoot> {
    let project = settings
        .extra_skill_dirs
        .iter()
        .cloned()
        .chain(project_skill_roots(cwd))
        .map(|path| SkillRoot::new(path, SkillSource::Project));
    let user = user_skill_roots()
        .into_iter()
        .map(|path| SkillRoot::new(path, SkillSource::User));
    project.chain(user).collect()
}

/// Find and load every skill below `roots`.
///
/// Documents that fail to load are logged and skipped. The result is in
/// discovery order.
pub fn discover(roots: &[SkillRoot], max_depth: usize) -> Vec<Skill> {
    let mut seen = HashSet::new();
    let mut skills = Vec::new();

    for root in roots {
        if !root.path.is_dir() {
            debug!(root = %root.path.display(), "Skill root does not exist, skipping");
            continue;
        }

        for path in skill_documents(&root.path, max_depth) {
            let skill = match load_skill(&path, root.source) {
                Ok(skill) => skill,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable skill");
                    continue;
                }
            };

            if seen.insert(skill.name.clone()) {
                debug!(skill = %skill.name, path = %path.display(), "Discovered skill");
                skills.push(skill);
            } else {
                debug!(
                    skill = %skill.name,
                    path = %path.display(),
                    "Skill shadowed by an earlier root"
                );
            }
        }
    }

    skills
}

fn skill_documents(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == SKILL_DOCUMENT_FILE)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Load one `SKILL.md` and its sibling `mcp.json`, if any.
pub fn load_skill(path: &Path, source: SkillSource) -> Result<Skill, SkillError> {
    let content = fs::read_to_string(path).map_err(|e| SkillError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let document = parse_document(&content).map_err(|message| SkillError::InvalidFrontMatter {
        path: path.to_path_buf(),
        message,
    })?;
    let front_matter = document.front_matter;

    let name = front_matter
        .name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| directory_name(path))
        .ok_or_else(|| SkillError::InvalidFrontMatter {
            path: path.to_path_buf(),
            message: "no name and no parent directory to name the skill after".to_string(),
        })?;

    let config_path = path.with_file_name(SKILL_CONFIG_FILE);
    let mcp = if config_path.is_file() {
        let text = fs::read_to_string(&config_path).map_err(|e| SkillError::Io {
            path: config_path.clone(),
            message: e.to_string(),
        })?;
        let servers =
            parse_server_file(&text).map_err(|message| SkillError::InvalidServerConfig {
                path: config_path.clone(),
                message,
            })?;
        if !front_matter.mcp.is_empty() {
            debug!(
                skill = %name,
                config = %config_path.display(),
                "Sibling server file overrides front-matter servers"
            );
        }
        servers
    } else {
        front_matter.mcp
    };

    Ok(Skill {
        name,
        description: front_matter.description.filter(|d| !d.trim().is_empty()),
        body: document.body,
        path: path.to_path_buf(),
        source,
        mcp,
    })
}

fn directory_name(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_skill(root: &Path, dir: &str, content: &str) -> PathBuf {
        let skill_dir = root.join(dir);
        fs::create_dir_all(&skill_dir).unwrap();
        let path = skill_dir.join(SKILL_DOCUMENT_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_name_defaults_to_directory() {
        let tmp = TempDir::new().unwrap();
        let path = write_skill(tmp.path(), "pdf-tools", "# PDF\n\nUse pdftotext.");
        let skill = load_skill(&path, SkillSource::User).unwrap();
        assert_eq!(skill.name, "pdf-tools");
        assert_eq!(skill.body, "# PDF\n\nUse pdftotext.");
        assert!(!skill.has_servers());
        assert_eq!(skill.source, SkillSource::User);
    }

    #[test]
    fn test_sibling_config_overrides_front_matter() {
        let tmp = TempDir::new().unwrap();
        let path = write_skill(
            tmp.path(),
            "gh",
            "---\nname: github\nmcp:\n  old:\n    command: old-server\n---\nbody",
        );
        fs::write(
            path.with_file_name(SKILL_CONFIG_FILE),
            r#"{"mcpServers": {"github": {"command": ["npx", "gh-server"]}}}"#,
        )
        .unwrap();

        let skill = load_skill(&path, SkillSource::Project).unwrap();
        assert_eq!(skill.name, "github");
        assert!(skill.server("old").is_none());
        assert_eq!(skill.server("github").unwrap().command, json!(["npx", "gh-server"]));
    }

    #[test]
    fn test_invalid_sibling_config_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_skill(tmp.path(), "bad", "body");
        fs::write(path.with_file_name(SKILL_CONFIG_FILE), "[]").unwrap();
        let err = load_skill(&path, SkillSource::Project).unwrap_err();
        assert!(matches!(err, SkillError::InvalidServerConfig { .. }));
    }

    #[test]
    fn test_project_shadows_user() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_skill(project.path(), "deploy", "---\ndescription: project copy\n---\n");
        write_skill(user.path(), "deploy", "---\ndescription: user copy\n---\n");
        write_skill(user.path(), "notes", "user only");

        let roots = vec![
            SkillRoot::new(project.path(), SkillSource::Project),
            SkillRoot::new(user.path(), SkillSource::User),
        ];
        let skills = discover(&roots, 4);

        assert_eq!(skills.len(), 2);
        let deploy = skills.iter().find(|s| s.name == "deploy").unwrap();
        assert_eq!(deploy.description.as_deref(), Some("project copy"));
        assert_eq!(deploy.source, SkillSource::Project);
        assert!(skills.iter().any(|s| s.name == "notes" && s.source == SkillSource::User));
    }

    #[test]
    fn test_broken_documents_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "good", "fine");
        write_skill(tmp.path(), "broken", "---\nname: never closed\n");

        let skills = discover(&[SkillRoot::new(tmp.path(), SkillSource::Project)], 4);
        let names: Vec<_> = skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["good"]);
    }

    #[test]
    fn test_depth_bound_and_missing_root() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "a/b/c/deep", "too deep");
        write_skill(tmp.path(), "shallow", "ok");

        let roots = vec![
            SkillRoot::new(tmp.path().join("missing"), SkillSource::Project),
            SkillRoot::new(tmp.path(), SkillSource::Project),
        ];
        let names: Vec<_> = discover(&roots, 2).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["shallow"]);
    }

    #[test]
    fn test_extra_dirs_come_first() {
        let settings = Settings {
            extra_skill_dirs: vec![PathBuf::from("/opt/skills")],
            ..Settings::default()
        };
        let roots = default_roots(Path::new("/work"), &settings);
        assert_eq!(roots[0], SkillRoot::new("/opt/skills", SkillSource::Project));
        assert_eq!(
            roots[1],
            SkillRoot::new("/work/.skillpool/skills", SkillSource::Project)
        );
        assert!(roots[3..].iter().all(|r| r.source == SkillSource::User));
    }
}
