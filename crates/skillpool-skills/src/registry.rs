//! In-memory skill registry implementing [`SkillCatalog`].

use std::path::Path;

use async_trait::async_trait;
use skillpool_core::{Settings, Skill, SkillCatalog};
use tokio::sync::RwLock;
use tracing::info;

use crate::discovery::{SkillRoot, default_roots, discover};
use crate::error::SkillError;

/// Skills discovered below a fixed set of roots.
pub struct SkillRegistry {
    roots: Vec<SkillRoot>,
    max_depth: usize,
    skills: RwLock<Vec<Skill>>,
}

impl SkillRegistry {
    /// Registry over `roots`. Nothing is loaded until [`Self::load`].
    pub fn new(roots: Vec<SkillRoot>, max_depth: usize) -> Self {
        Self {
            roots,
            max_depth,
            skills: RwLock::new(Vec::new()),
        }
    }

    /// Registry over the default roots for `cwd`.
    pub fn from_settings(cwd: &Path, settings: &Settings) -> Self {
        Self::new(default_roots(cwd, settings), settings.max_walk_depth)
    }

    /// Registry preloaded with `skills`, with no roots to reload from.
    pub fn from_skills(mut skills: Vec<Skill>) -> Self {
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            roots: Vec::new(),
            max_depth: 1,
            skills: RwLock::new(skills),
        }
    }

    pub fn roots(&self) -> &[SkillRoot] {
        &self.roots
    }

    /// Walk the roots and replace the loaded skills. Returns the skill count.
    pub async fn load(&self) -> Result<usize, SkillError> {
        if self.roots.is_empty() {
            return Ok(self.skills.read().await.len());
        }

        let roots = self.roots.clone();
        let max_depth = self.max_depth;
        let mut skills = tokio::task::spawn_blocking(move || discover(&roots, max_depth))
            .await
            .map_err(|e| SkillError::Discovery(e.to_string()))?;
        skills.sort_by(|a, b| a.name.cmp(&b.name));

        let count = skills.len();
        *self.skills.write().await = skills;
        info!(count, roots = self.roots.len(), "Loaded skills");
        Ok(count)
    }

    /// Same as [`Self::load`]; picks up added, edited and removed skills.
    pub async fn reload(&self) -> Result<usize, SkillError> {
        self.load().await
    }
}

#[async_trait]
impl SkillCatalog for SkillRegistry {
    async fn list(&self) -> Vec<Skill> {
        self.skills.read().await.clone()
    }

    async fn get(&self, name: &str) -> Option<Skill> {
        self.skills
            .read()
            .await
            .iter()
            .find(|skill| skill.name == name)
            .cloned()
    }
}
