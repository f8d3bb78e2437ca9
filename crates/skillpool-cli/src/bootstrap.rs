//! CLI bootstrap - the composition root.
//!
//! This module is the only place where concrete implementations are wired
//! together:
//! - `Settings` from the environment (via skillpool-core)
//! - the MCP connection manager (via skillpool-mcp)
//! - the skill registry, tool surface and session lifecycle (via skillpool-skills)
//!
//! Handlers receive the composed `CliContext`.

use std::path::PathBuf;
use std::sync::Arc;

use skillpool_core::{McpGateway, SessionId, Settings, SkillCatalog, validate_settings};
use skillpool_mcp::McpManager;
use skillpool_skills::{InvokeTool, SessionLifecycle, SkillRegistry, SkillTool};
use tracing::debug;

use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory the project skill roots are resolved against.
    pub cwd: PathBuf,
    /// Skill directories from the command line, highest priority first.
    pub skill_dirs: Vec<PathBuf>,
    /// Explicit session id; a fresh one is generated when absent.
    pub session: Option<String>,
}

impl CliConfig {
    /// Config for the current directory and no extra options.
    pub fn with_defaults() -> Result<Self, CliError> {
        Ok(Self {
            cwd: std::env::current_dir()?,
            skill_dirs: Vec::new(),
            session: None,
        })
    }

    /// Config from parsed command-line options.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Ok(Self {
            skill_dirs: cli.skill_dirs.clone(),
            session: cli.session.clone(),
            ..Self::with_defaults()?
        })
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub settings: Settings,
    pub registry: Arc<SkillRegistry>,
    pub manager: Arc<McpManager>,
    pub skill_tool: SkillTool,
    pub invoke_tool: InvokeTool,
    pub lifecycle: SessionLifecycle,
    /// Session every command of this process runs in.
    pub session: SessionId,
}

impl CliContext {
    /// End the session and stop every server it started.
    pub async fn shutdown(&self) {
        self.lifecycle.on_session_end(&self.session).await;
        // Catches connections still settling when the session ended.
        self.manager.shutdown_all().await;
    }
}

/// Build the context: settings, skill registry, connection manager, session.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let mut settings = Settings::from_env()?;
    let mut skill_dirs = config.skill_dirs;
    skill_dirs.append(&mut settings.extra_skill_dirs);
    settings.extra_skill_dirs = skill_dirs;
    validate_settings(&settings)?;

    let registry = Arc::new(SkillRegistry::from_settings(&config.cwd, &settings));
    registry.load().await?;

    let manager = Arc::new(McpManager::new(settings.mcp_timeouts()));
    let catalog: Arc<dyn SkillCatalog> = registry.clone();
    let gateway: Arc<dyn McpGateway> = manager.clone();

    let session = config
        .session
        .filter(|id| !id.trim().is_empty())
        .map_or_else(SessionId::generate, SessionId::new);

    let lifecycle = SessionLifecycle::new(gateway.clone());
    lifecycle.on_session_start(session.clone()).await;

    debug!(
        session = %session,
        cwd = %config.cwd.display(),
        roots = registry.roots().len(),
        "CLI context ready"
    );

    Ok(CliContext {
        skill_tool: SkillTool::new(catalog.clone(), gateway.clone()),
        invoke_tool: InvokeTool::new(catalog, gateway),
        settings,
        registry,
        manager,
        lifecycle,
        session,
    })
}
