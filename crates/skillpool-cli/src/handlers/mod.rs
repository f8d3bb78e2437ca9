//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Build the request, call the skill layer, print the result.

pub mod invoke;
pub mod list;
pub mod servers;
pub mod skill;
