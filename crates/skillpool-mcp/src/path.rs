//! Child process `PATH` and working directory handling.
//!
//! Skill configs usually name bare commands (`npx`, `uvx`), so the child gets
//! the parent's `PATH`, preceded by the executable's own directory when the
//! command is a path, and followed by common install locations on macOS.

use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use skillpool_core::McpError;

/// Locations missing from `PATH` when launched outside a login shell.
#[cfg(target_os = "macos")]
const MACOS_DEFAULT_PATHS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/sbin",
    "/sbin",
];

/// Build the `PATH` for a child that runs `executable`.
///
/// Returns `None` when an entry cannot be joined (e.g. it contains the
/// separator), in which case the inherited `PATH` is left untouched.
pub fn build_effective_path(executable: &str) -> Option<OsString> {
    let mut entries: Vec<PathBuf> = Vec::new();

    let exe = Path::new(executable);
    if exe.components().count() > 1 {
        if let Some(dir) = exe.parent().filter(|d| !d.as_os_str().is_empty()) {
            entries.push(dir.to_path_buf());
        }
    }

    if let Some(current) = env::var_os("PATH") {
        entries.extend(env::split_paths(&current).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "macos")]
    entries.extend(MACOS_DEFAULT_PATHS.iter().map(PathBuf::from));

    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));

    env::join_paths(entries).ok()
}

/// Check that a configured working directory exists and is a directory.
pub fn validate_working_dir(cwd: &Path) -> Result<(), McpError> {
    if !cwd.exists() {
        return Err(McpError::InvalidConfiguration(format!(
            "cwd does not exist: {}",
            cwd.display()
        )));
    }
    if !cwd.is_dir() {
        return Err(McpError::InvalidConfiguration(format!(
            "cwd is not a directory: {}",
            cwd.display()
        )));
    }
    Ok(())
}
