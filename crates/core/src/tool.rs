//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the research agent the ability to act in the world:
//! search the web, crawl pages, read encyclopedia articles, store findings
//! and write the final report.
//!
//! Every tool declares a [`ParameterSchema`]. The schema is rendered to JSON
//! Schema for the LLM and is also used to validate arguments before a handler
//! ever runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;

use crate::error::ToolError;

/// A request to execute a tool, with arguments already parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// The result of a dispatched tool call, ready to be appended to the
/// conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// The tool that was requested
    pub tool_name: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (error string on failure)
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub data: Option<Value>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), data: None }
    }

    /// Output whose content is the compact JSON rendering of `value`.
    pub fn json(value: Value) -> Self {
        Self { content: value.to_string(), data: Some(value) }
    }
}

/// JSON type of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array(Box<ParamType>),
}

impl ParamType {
    fn json_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array(_) => "array",
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Self::Array(items) => json!({ "type": "array", "items": items.to_json_schema() }),
            other => json!({ "type": other.json_name() }),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array(_) => value.is_array(),
        }
    }
}

fn json_type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

/// The enumerated parameters a tool accepts.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.with(name, param_type, description, true)
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.with(name, param_type, description, false)
    }

    fn with(mut self, name: &str, param_type: ParamType, description: &str, required: bool) -> Self {
        self.params.push(ParameterSpec {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    /// Render as a JSON Schema object for the LLM's tool catalogue.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut schema = p.param_type.to_json_schema();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".into(), Value::String(p.description.clone()));
            }
            properties.insert(p.name.clone(), schema);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `arguments` against the schema.
    ///
    /// `null` is accepted as an empty argument object. The error string names
    /// the first constraint that failed.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let empty = Map::new();
        let args = match arguments {
            Value::Null => &empty,
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "arguments must be a JSON object, got {}",
                    json_type_of(other)
                ));
            }
        };

        for key in args.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(format!("unknown parameter '{key}'"));
            }
        }

        for p in &self.params {
            match args.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    return Err(format!("missing required parameter '{}'", p.name));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    if !p.param_type.matches(value) {
                        return Err(format!(
                            "parameter '{}' must be of type {}, got {}",
                            p.name,
                            p.param_type.json_name(),
                            json_type_of(value)
                        ));
                    }
                    if let (ParamType::Array(item_type), Value::Array(items)) = (&p.param_type, value) {
                        if let Some((i, bad)) = items.iter().enumerate().find(|(_, v)| !item_type.matches(v)) {
                            return Err(format!(
                                "parameter '{}' item {} must be of type {}, got {}",
                                p.name,
                                i,
                                item_type.json_name(),
                                json_type_of(bad)
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Tool definition sent to the LLM so it knows what tools are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: Value,
}

/// The core Tool trait.
///
/// Each capability (search, crawl, wikipedia, knowledge, report) implements
/// this trait. Tools are registered in the ToolRegistry and invoked by the
/// dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "duckduckgo_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// The parameters this tool accepts.
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with arguments that already passed validation.
    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().to_json_schema(),
        }
    }
}

/// A registry of available tools, kept in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool, failing with `NotFound` when absent.
    pub fn resolve(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Tool definitions in registration order (for sending to the LLM).
    pub fn list_schemas(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
