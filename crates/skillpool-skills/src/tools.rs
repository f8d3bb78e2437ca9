//! The `skill` and `invoke` operations exposed to an agent.
//!
//! Both go through [`McpGateway`] with the caller's session id, so the
//! gateway decides whether a server is spawned or reused.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};
use skillpool_core::{
    McpCallInfo, McpError, McpGateway, McpServerContext, SessionId, Skill, SkillCatalog,
};
use tracing::{debug, warn};

use crate::error::{InvokeError, SkillError};
use crate::render::{ServerDiscovery, ServerSection, render_skill};

/// Loads a skill and lists what its servers offer.
pub struct SkillTool {
    catalog: Arc<dyn SkillCatalog>,
    gateway: Arc<dyn McpGateway>,
}

impl SkillTool {
    pub fn new(catalog: Arc<dyn SkillCatalog>, gateway: Arc<dyn McpGateway>) -> Self {
        Self { catalog, gateway }
    }

    /// Render skill `name`, discovering each declared server in `session`.
    ///
    /// A server that fails discovery is rendered as a failure note; the
    /// listing as a whole only fails when the skill does not exist.
    pub async fn execute(&self, name: &str, session: &SessionId) -> Result<String, SkillError> {
        let Some(skill) = self.catalog.get(name).await else {
            return Err(SkillError::NotFound {
                name: name.to_string(),
                available: self.catalog.available_names().await,
            });
        };

        let sections = join_all(
            skill
                .mcp
                .keys()
                .map(|server| self.discover_server(&skill, server, session)),
        )
        .await;

        Ok(render_skill(&skill, &sections))
    }

    async fn discover_server(
        &self,
        skill: &Skill,
        server: &str,
        session: &SessionId,
    ) -> ServerSection {
        let (info, context) = call_context(skill, server, session);

        let tools = match self.gateway.list_tools(&info, &context).await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(
                    server = %server,
                    skill = %skill.name,
                    session = %session,
                    error = %e,
                    "Server discovery failed"
                );
                return ServerSection {
                    server: server.to_string(),
                    discovery: Err(e.to_string()),
                };
            }
        };

        let (resources, prompts) = futures_util::join!(
            self.gateway.list_resources(&info, &context),
            self.gateway.list_prompts(&info, &context),
        );

        let mut notes = Vec::new();
        let resources = optional_listing(server, "resources", resources, &mut notes);
        let prompts = optional_listing(server, "prompts", prompts, &mut notes);

        ServerSection {
            server: server.to_string(),
            discovery: Ok(ServerDiscovery {
                tools,
                resources,
                prompts,
                notes,
            }),
        }
    }
}

/// The listing, or nothing plus a note when the server could not list `what`.
fn optional_listing<T>(
    server: &str,
    what: &str,
    listing: Result<Vec<T>, McpError>,
    notes: &mut Vec<String>,
) -> Vec<T> {
    listing.unwrap_or_else(|e| {
        warn!(server = %server, listing = what, error = %e, "Listing failed");
        notes.push(format!("{what} unavailable: {e}"));
        Vec::new()
    })
}

fn call_context(skill: &Skill, server: &str, session: &SessionId) -> (McpCallInfo, McpServerContext) {
    let config = skill.server(server).cloned().unwrap_or_default();
    (
        McpCallInfo::new(server, skill.name.as_str(), session.clone()),
        McpServerContext::new(config, skill.name.as_str()),
    )
}

/// Input of the `invoke` operation.
///
/// Exactly one of `tool_name`, `resource_uri` and `prompt_name` must be set.
/// Blank strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvokeRequest {
    pub server_name: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default, alias = "resource_name")]
    pub resource_uri: Option<String>,
    #[serde(default)]
    pub prompt_name: Option<String>,
    /// JSON-encoded arguments for a tool or prompt.
    #[serde(default)]
    pub arguments: Option<String>,
    /// Case-insensitive regex; only matching output lines are kept.
    #[serde(default)]
    pub filter: Option<String>,
}

impl InvokeRequest {
    pub fn tool(server: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            server_name: server.into(),
            tool_name: Some(tool.into()),
            ..Self::default()
        }
    }

    pub fn resource(server: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            server_name: server.into(),
            resource_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    pub fn prompt(server: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            server_name: server.into(),
            prompt_name: Some(prompt.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = Some(arguments.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn operation(&self) -> Result<Operation<'_>, InvokeError> {
        let selected: Vec<Operation<'_>> = [
            present(self.tool_name.as_ref()).map(Operation::Tool),
            present(self.resource_uri.as_ref()).map(Operation::Resource),
            present(self.prompt_name.as_ref()).map(Operation::Prompt),
        ]
        .into_iter()
        .flatten()
        .collect();

        match selected.as_slice() {
            [] => Err(InvokeError::NoOperation),
            [operation] => Ok(*operation),
            _ => Err(InvokeError::MultipleOperations),
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Tool(&'a str),
    Resource(&'a str),
    Prompt(&'a str),
}

impl<'a> Operation<'a> {
    const fn kind(self) -> &'static str {
        match self {
            Self::Tool(_) => "tool",
            Self::Resource(_) => "resource",
            Self::Prompt(_) => "prompt",
        }
    }

    const fn target(self) -> &'a str {
        match self {
            Self::Tool(target) | Self::Resource(target) | Self::Prompt(target) => target,
        }
    }
}

/// Calls one tool, resource or prompt on a server declared by a loaded skill.
pub struct InvokeTool {
    catalog: Arc<dyn SkillCatalog>,
    gateway: Arc<dyn McpGateway>,
}

impl InvokeTool {
    pub fn new(catalog: Arc<dyn SkillCatalog>, gateway: Arc<dyn McpGateway>) -> Self {
        Self { catalog, gateway }
    }

    /// Validate, dispatch and format one invocation.
    ///
    /// Request validation happens before any connection activity.
    pub async fn execute(
        &self,
        request: &InvokeRequest,
        session: &SessionId,
    ) -> Result<String, InvokeError> {
        let operation = request.operation()?;
        let arguments = parse_arguments(request.arguments.as_deref())?;
        let filter = compile_filter(request.filter.as_deref())?;

        let server = request.server_name.trim();
        let Some((skill, config)) = self.catalog.find_server_owner(server).await else {
            return Err(self.unknown_server(server).await);
        };

        debug!(
            server = %server,
            skill = %skill.name,
            session = %session,
            operation = operation.kind(),
            name = operation.target(),
            "Invoking MCP operation"
        );

        let info = McpCallInfo::new(server, skill.name.as_str(), session.clone());
        let context = McpServerContext::new(config, skill.name.as_str());

        let result = match operation {
            Operation::Tool(name) => {
                let arguments = tool_arguments(arguments, request.arguments.as_deref())?;
                self.gateway
                    .call_tool(&info, &context, name, arguments)
                    .await
            }
            Operation::Resource(uri) => self.gateway.read_resource(&info, &context, uri).await,
            Operation::Prompt(name) => {
                let arguments = prompt_arguments(arguments, request.arguments.as_deref())?;
                self.gateway
                    .get_prompt(&info, &context, name, arguments)
                    .await
            }
        };

        let value = match result {
            Ok(value) => value,
            Err(e) => return Err(self.operation_error(&info, &context, operation, e).await),
        };

        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Ok(match &filter {
            Some(filter) => filter_lines(&text, filter),
            None => text,
        })
    }

    async fn unknown_server(&self, server: &str) -> InvokeError {
        let pairs: Vec<String> = self
            .catalog
            .known_servers()
            .await
            .into_iter()
            .map(|(server, skill)| format!("{server} ({skill})"))
            .collect();
        InvokeError::UnknownServer {
            server: server.to_string(),
            known: join_or_none(&pairs),
        }
    }

    async fn operation_error(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        operation: Operation<'_>,
        error: McpError,
    ) -> InvokeError {
        if matches!(error, McpError::UnknownCapability(_)) {
            if let Some(available) = self.alternatives(info, context, operation).await {
                return InvokeError::UnknownCapability {
                    server: info.server_name.clone(),
                    kind: operation.kind(),
                    target: operation.target().to_string(),
                    available: join_or_none(&available),
                };
            }
        }

        InvokeError::Operation {
            server: info.server_name.clone(),
            kind: operation.kind(),
            target: operation.target().to_string(),
            source: error,
        }
    }

    async fn alternatives(
        &self,
        info: &McpCallInfo,
        context: &McpServerContext,
        operation: Operation<'_>,
    ) -> Option<Vec<String>> {
        let listed = match operation {
            Operation::Tool(_) => self
                .gateway
                .list_tools(info, context)
                .await
                .map(|tools| tools.into_iter().map(|t| t.name).collect()),
            Operation::Resource(_) => self
                .gateway
                .list_resources(info, context)
                .await
                .map(|resources| resources.into_iter().map(|r| r.uri).collect()),
            Operation::Prompt(_) => self
                .gateway
                .list_prompts(info, context)
                .await
                .map(|prompts| prompts.into_iter().map(|p| p.name).collect()),
        };

        match listed {
            Ok(names) => Some(names),
            Err(e) => {
                debug!(server = %info.server_name, error = %e, "Could not list alternatives");
                None
            }
        }
    }
}

fn parse_arguments(text: Option<&str>) -> Result<Option<Value>, InvokeError> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Ok(None);
    };
    serde_json::from_str(text)
        .map(Some)
        .map_err(|e| InvokeError::InvalidArguments {
            text: text.to_string(),
            message: e.to_string(),
        })
}

fn tool_arguments(arguments: Option<Value>, text: Option<&str>) -> Result<Value, InvokeError> {
    match arguments {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(object @ Value::Object(_)) => Ok(object),
        Some(_) => Err(InvokeError::InvalidArguments {
            text: text.unwrap_or_default().to_string(),
            message: "tool arguments must be a JSON object".to_string(),
        }),
    }
}

fn prompt_arguments(
    arguments: Option<Value>,
    text: Option<&str>,
) -> Result<BTreeMap<String, String>, InvokeError> {
    match arguments {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()),
        Some(_) => Err(InvokeError::InvalidArguments {
            text: text.unwrap_or_default().to_string(),
            message: "prompt arguments must be a JSON object".to_string(),
        }),
    }
}

fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>, InvokeError> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| InvokeError::InvalidFilter {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Keep the lines of `text` that match `filter`.
pub fn filter_lines(text: &str, filter: &Regex) -> String {
    let kept: Vec<&str> = text.lines().filter(|line| filter.is_match(line)).collect();
    if kept.is_empty() {
        format!("[no lines matched: {}]", filter.as_str())
    } else {
        kept.join("\n")
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
