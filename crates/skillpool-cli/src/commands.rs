//! Available subcommands.

use clap::{ArgGroup, Subcommand};

/// Commands of the `skillpool` binary.
#[derive(Subcommand)]
pub enum Commands {
    /// List discovered skills
    List,

    /// Show a skill and the tools, resources and prompts of its servers
    Skill {
        /// Skill name
        name: String,
    },

    /// Call a tool, read a resource or render a prompt on a skill's server
    #[command(group(
        ArgGroup::new("operation")
            .args(["tool", "resource", "prompt"])
            .required(true)
    ))]
    Invoke {
        /// MCP server name as declared by a skill
        server: String,

        /// Tool to call
        #[arg(long)]
        tool: Option<String>,

        /// Resource URI to read
        #[arg(long)]
        resource: Option<String>,

        /// Prompt to render
        #[arg(long)]
        prompt: Option<String>,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,

        /// Only print output lines matching this case-insensitive regex
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List MCP servers declared by discovered skills
    Servers,
}
