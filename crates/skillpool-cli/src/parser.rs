//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Discover skills and call the MCP servers they bundle.
///
/// Every invocation is one session: servers are started on first use and
/// shut down before the process exits.
#[derive(Parser)]
#[command(name = "skillpool")]
#[command(about = "Discover skills and call the MCP servers they bundle")]
#[command(version)]
pub struct Cli {
    /// Additional skill directory, searched before the default roots
    #[arg(long = "skill-dir", global = true)]
    pub skill_dirs: Vec<PathBuf>,

    /// Session id to use instead of a generated one
    #[arg(long, global = true, env = "SKILLPOOL_SESSION_ID")]
    pub session: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
