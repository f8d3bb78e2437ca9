//! Skill catalog trait definition.

use async_trait::async_trait;

use crate::domain::{ServerConfig, Skill};

/// Read access to the currently loaded skills.
#[async_trait]
pub trait SkillCatalog: Send + Sync {
    /// All loaded skills, sorted by name.
    async fn list(&self) -> Vec<Skill>;

    /// A skill by exact name.
    async fn get(&self, name: &str) -> Option<Skill>;

    /// Comma-separated names of the loaded skills, or `none`.
    async fn available_names(&self) -> String {
        let names: Vec<String> = self.list().await.into_iter().map(|s| s.name).collect();
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    }

    /// The first loaded skill (in name order) that declares `server`.
    async fn find_server_owner(&self, server: &str) -> Option<(Skill, ServerConfig)> {
        self.list().await.into_iter().find_map(|skill| {
            let config = skill.server(server)?.clone();
            Some((skill, config))
        })
    }

    /// Every `(server name, skill name)` pair across loaded skills.
    async fn known_servers(&self) -> Vec<(String, String)> {
        self.list()
            .await
            .iter()
            .flat_map(|skill| {
                skill
                    .mcp
                    .keys()
                    .map(|server| (server.clone(), skill.name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
