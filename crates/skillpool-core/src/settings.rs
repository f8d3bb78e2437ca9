//! Settings domain types and validation.
//!
//! Settings come from defaults overridden by `SKILLPOOL_*` environment
//! variables. The CLI loads a `.env` file before reading them.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::McpTimeouts;

/// Default bound on spawn + `initialize`.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Default bound on one request round trip.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default wait for a server to exit before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Default directory depth searched below each skill root.
pub const DEFAULT_MAX_WALK_DEPTH: usize = 4;

/// Upper bound for any configured timeout.
const MAX_TIMEOUT_SECS: u64 = 3600;

const ENV_SKILL_DIRS: &str = "SKILLPOOL_SKILL_DIRS";
const ENV_HANDSHAKE_TIMEOUT: &str = "SKILLPOOL_HANDSHAKE_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT: &str = "SKILLPOOL_REQUEST_TIMEOUT_SECS";
const ENV_SHUTDOWN_GRACE: &str = "SKILLPOOL_SHUTDOWN_GRACE_SECS";
const ENV_MAX_WALK_DEPTH: &str = "SKILLPOOL_MAX_WALK_DEPTH";

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Extra skill roots searched before the default project roots.
    pub extra_skill_dirs: Vec<PathBuf>,
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    /// Directory depth searched below each skill root.
    pub max_walk_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extra_skill_dirs: Vec::new(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }
}

impl Settings {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, then validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(dirs) = lookup(ENV_SKILL_DIRS) {
            settings.extra_skill_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(raw) = lookup(ENV_HANDSHAKE_TIMEOUT) {
            settings.handshake_timeout_secs = parse_number(ENV_HANDSHAKE_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            settings.request_timeout_secs = parse_number(ENV_REQUEST_TIMEOUT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SHUTDOWN_GRACE) {
            settings.shutdown_grace_secs = parse_number(ENV_SHUTDOWN_GRACE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_WALK_DEPTH) {
            settings.max_walk_depth = parse_number(ENV_MAX_WALK_DEPTH, &raw)?;
        }

        validate_settings(&settings)?;

        tracing::debug!(
            extra_skill_dirs = settings.extra_skill_dirs.len(),
            handshake_timeout_secs = settings.handshake_timeout_secs,
            request_timeout_secs = settings.request_timeout_secs,
            shutdown_grace_secs = settings.shutdown_grace_secs,
            "Loaded settings"
        );

        Ok(settings)
    }

    /// Connection bounds derived from these settings.
    pub const fn mcp_timeouts(&self) -> McpTimeouts {
        McpTimeouts {
            handshake: Duration::from_secs(self.handshake_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{key} must be a non-negative integer, got '{value}'")]
    NotANumber { key: String, value: String },

    #[error("{name} must be between 1 and 3600 seconds, got {value}")]
    InvalidTimeout { name: &'static str, value: u64 },

    #[error("Skill search depth must be at least 1")]
    InvalidWalkDepth,
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, SettingsError> {
    raw.trim().parse().map_err(|_| SettingsError::NotANumber {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    let timeouts = [
        ("handshake timeout", settings.handshake_timeout_secs),
        ("request timeout", settings.request_timeout_secs),
        ("shutdown grace period", settings.shutdown_grace_secs),
    ];
    for (name, value) in timeouts {
        if value == 0 || value > MAX_TIMEOUT_SECS {
            return Err(SettingsError::InvalidTimeout { name, value });
        }
    }

    if settings.max_walk_depth == 0 {
        return Err(SettingsError::InvalidWalkDepth);
    }

    Ok(())
}
