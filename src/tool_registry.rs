//! Tool Registry & Invoker (spec.md §4.1).
//!
//! Grounded on `cloudllm::tool_protocol::{ToolProtocol, ToolRegistry,
//! ToolMetadata, ToolParameter, ToolResult, ToolError}`: the same
//! name-to-tool map, JSON-schema-shaped argument contract, and
//! `{error_kind, message}` structured-failure result the teacher uses for
//! its own built-in tools, narrowed here to the four tools the spec names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// JSON-schema-like parameter type tags, mirroring the teacher's
/// `ToolParameterType`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self { name: name.into(), param_type, description: description.into(), required: true }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), parameters: Vec::new() }
    }

    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Renders this tool's schema for a `ChatModel` request.
    pub fn to_schema(&self) -> crate::model::ToolSchema {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let ty = match p.param_type {
                    ParamType::String => "string",
                    ParamType::Integer => "integer",
                    ParamType::Boolean => "boolean",
                    ParamType::Array => "array",
                };
                (p.name.clone(), serde_json::json!({"type": ty, "description": p.description}))
            })
            .collect();
        let required: Vec<&str> = self.parameters.iter().filter(|p| p.required).map(|p| p.name.as_str()).collect();
        crate::model::ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Structured tool-execution outcome. Failures are observable results, not
/// exceptions — the caller's LLM loop sees `{error_kind, message}` as the
/// tool result content (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    pub error: Option<ToolErrorPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolErrorPayload {
    pub error_kind: String,
    pub message: String,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self { success: true, output, error: None }
    }

    pub fn failure(error_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(ToolErrorPayload { error_kind: error_kind.into(), message: message.into() }),
        }
    }

    /// Renders the result the way it should appear as tool-result content in
    /// the caller's chat transcript.
    pub fn as_model_text(&self) -> String {
        match &self.error {
            None => self.output.to_string(),
            Some(e) => serde_json::json!({"error_kind": e.error_kind, "message": e.message}).to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ToolError {
    NotFound(String),
    InvalidParameters(String),
    ExecutionFailed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "tool not found: {}", name),
            ToolError::InvalidParameters(msg) => write!(f, "invalid parameters: {}", msg),
            ToolError::ExecutionFailed(msg) => write!(f, "execution failed: {}", msg),
        }
    }
}
impl Error for ToolError {}

/// One invocable tool: its metadata plus the async function backing it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> &ToolMetadata;
    async fn execute(&self, arguments: Value) -> Result<ToolResult, Box<dyn Error + Send + Sync>>;
}

/// Routes named tool invocations to registered `Tool` implementations.
///
/// `run_subagents` and `complete_task` are registered here for schema
/// advertisement (so they appear in the `tools` list sent to the
/// ChatModel), but their actual dispatch is intercepted by the Lead/
/// Subagent loops before reaching `execute_tool` — see `crate::lead` and
/// `crate::subagent` — because both have control-flow semantics
/// (`run_subagents` blocks on children; `complete_task` terminates the
/// caller's own loop) that a plain tool function cannot express.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.metadata().name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn schemas(&self) -> Vec<crate::model::ToolSchema> {
        self.tools.values().map(|t| t.metadata().to_schema()).collect()
    }

    /// Validates that required arguments are present, then dispatches.
    /// Budget accounting happens in the caller (the Subagent/Lead loop),
    /// *before* this is invoked, per spec.md §4.1 ("counts the call against
    /// the caller's budget before dispatch").
    pub async fn execute_tool(&self, name: &str, arguments: Value) -> ToolResult {
        let tool = match self.tools.get(name) {
            Some(t) => t.clone(),
            None => return ToolResult::failure("not_found", format!("no such tool: {}", name)),
        };
        if let Err(msg) = validate_required(tool.metadata(), &arguments) {
            return ToolResult::failure("invalid_parameters", msg);
        }
        match tool.execute(arguments).await {
            Ok(result) => result,
            Err(e) => ToolResult::failure("execution_failed", e.to_string()),
        }
    }
}

fn validate_required(metadata: &ToolMetadata, arguments: &Value) -> Result<(), String> {
    let obj = arguments.as_object();
    for param in metadata.parameters.iter().filter(|p| p.required) {
        let present = obj.map(|o| o.contains_key(&param.name)).unwrap_or(false);
        if !present {
            return Err(format!("missing required argument: {}", param.name));
        }
    }
    Ok(())
}
