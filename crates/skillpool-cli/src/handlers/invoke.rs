//! Invoke command handler.

use anyhow::Result;
use skillpool_skills::InvokeRequest;

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Command-line form of an `invoke` request.
#[derive(Debug, Clone, Default)]
pub struct InvokeArgs {
    pub server: String,
    pub tool: Option<String>,
    pub resource: Option<String>,
    pub prompt: Option<String>,
    pub args: Option<String>,
    pub filter: Option<String>,
}

impl From<InvokeArgs> for InvokeRequest {
    fn from(args: InvokeArgs) -> Self {
        Self {
            server_name: args.server,
            tool_name: args.tool,
            resource_uri: args.resource,
            prompt_name: args.prompt,
            arguments: args.args,
            filter: args.filter,
        }
    }
}

/// Run one invocation and print its formatted result.
pub async fn execute(ctx: &CliContext, args: InvokeArgs) -> Result<()> {
    let request = InvokeRequest::from(args);
    let text = ctx
        .invoke_tool
        .execute(&request, &ctx.session)
        .await
        .map_err(CliError::from)?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_onto_request() {
        let request = InvokeRequest::from(InvokeArgs {
            server: "github".to_string(),
            resource: Some("repo://readme".to_string()),
            filter: Some("title".to_string()),
            ..InvokeArgs::default()
        });
        assert_eq!(
            request,
            InvokeRequest::resource("github", "repo://readme").with_filter("title")
        );
    }
}
