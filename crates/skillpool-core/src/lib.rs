#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    ConnectionKey, McpCallInfo, McpPromptArgument, McpPromptInfo, McpResourceInfo,
    McpServerContext, McpTimeouts, McpToolInfo, ServerConfig, SessionId, Skill, SkillSource,
};
pub use ports::{McpError, McpErrorCategory, McpGateway, SkillCatalog};
pub use settings::{
    DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_MAX_WALK_DEPTH, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_GRACE_SECS, Settings, SettingsError, validate_settings,
};

// Re-export path utilities
pub use paths::{SKILL_CONFIG_FILE, SKILL_DOCUMENT_FILE, project_skill_roots, user_skill_roots};
