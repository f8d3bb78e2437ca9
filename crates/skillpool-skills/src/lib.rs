#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod frontmatter;
pub mod registry;
pub mod render;
pub mod session;
pub mod tools;

pub use config::parse_server_file;
pub use discovery::{SkillRoot, default_roots, discover, load_skill};
pub use error::{InvokeError, SkillError};
pub use frontmatter::{FrontMatter, SkillDocument, parse_document};
pub use registry::SkillRegistry;
pub use render::{ServerDiscovery, ServerSection, render_skill, render_skill_summary};
pub use session::SessionLifecycle;
pub use tools::{InvokeRequest, InvokeTool, SkillTool, filter_lines};
