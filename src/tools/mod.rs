//! Tool system for the agent.
//!
//! Each tool is a capability `{name, description, schema, execute}`. The
//! [`ToolRegistry`] is built once at startup and is read-only afterwards.

mod customer;
mod generic;

pub use customer::{customer_tools, GetUserDetails, NotifyCustomer, SearchUsers, UpdateSubscription};
pub use generic::{generic_tools, AccessRecord, ModifyRecord, QueryData, SendMessage};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ToolDefinition;
use crate::users::UserStore;

/// Failure while resolving or running a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        ToolError::Execution(message.into())
    }
}

/// Registry construction errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name.
    fn name(&self) -> &str;

    /// Get the tool description.
    fn description(&self) -> &str;

    /// Get the JSON schema for parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given (already JSON-decoded) arguments.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// Decode tool arguments into a typed parameter struct.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    if !args.is_object() {
        return Err(ToolError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&args)
        )));
    }
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Which catalogue of customer-service tools to give the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToolSet {
    /// Purpose-built tools with narrow schemas.
    Specific,
    /// Generic API wrappers with many parameters.
    Generic,
}

impl ToolSet {
    pub fn build(self, store: Arc<UserStore>) -> Vec<Arc<dyn Tool>> {
        match self {
            ToolSet::Specific => customer_tools(store),
            ToolSet::Generic => generic_tools(store),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSet::Specific => "specific",
            ToolSet::Generic => "generic",
        }
    }
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry. Tool names must be unique.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (index, tool) in tools.iter().enumerate() {
            if by_name.insert(tool.name().to_string(), index).is_some() {
                return Err(RegistryError::DuplicateTool(tool.name().to_string()));
            }
        }
        Ok(Self { tools, by_name })
    }

    /// Build the registry for a shipped tool set.
    pub fn for_tool_set(tool_set: ToolSet, store: Arc<UserStore>) -> Result<Self, RegistryError> {
        Self::new(tool_set.build(store))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all tools in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Tool catalogue in the function-calling format.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::function(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Resolve `name`, decode `raw_arguments` and run the tool.
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        // Some endpoints send "" for calls without arguments.
        let raw_arguments = match raw_arguments.trim() {
            "" => "{}",
            trimmed => trimmed,
        };
        let args: Value = serde_json::from_str(raw_arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Echo;

    #[derive(Deserialize)]
    struct EchoArgs {
        message: String,
    }

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            let args: EchoArgs = parse_args(args)?;
            if args.message == "fail" {
                return Err(ToolError::execution("echo refused"));
            }
            Ok(args.message)
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(vec![Arc::new(Echo)]).unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolRegistry::new(vec![Arc::new(Echo), Arc::new(Echo)]).err().unwrap();
        assert_eq!(err.to_string(), "Duplicate tool name: echo");
    }

    #[test]
    fn schemas_follow_registration_order() {
        let store = Arc::new(UserStore::new());
        let registry = ToolRegistry::for_tool_set(ToolSet::Specific, store).unwrap();
        let names: Vec<_> = registry
            .get_tool_schemas()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(
            names,
            ["notify_customer", "search_users", "get_user_details", "update_subscription"]
        );
    }

    #[test]
    fn list_tools_reports_names_and_descriptions() {
        let registry = ToolRegistry::for_tool_set(ToolSet::Generic, Arc::new(UserStore::new())).unwrap();
        let tools = registry.list_tools();
        assert_eq!(tools.len(), registry.len());
        assert_eq!(tools[0].name, "query_data");
        assert_eq!(tools[0].description, "Query data from any data source");
        assert!(!registry.is_empty());
    }

    #[tokio::test]
    async fn execute_success() {
        let out = registry().execute("echo", r#"{"message":"hi"}"#).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn execute_unknown_tool() {
        let err = registry().execute("missing", "{}").await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref n) if n == "missing"));
        assert_eq!(err.to_string(), "Tool missing not found");
    }

    #[tokio::test]
    async fn execute_malformed_json() {
        let err = registry().execute("echo", "{not json").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn execute_missing_field() {
        let err = registry().execute("echo", "{}").await.unwrap_err();
        match err {
            ToolError::InvalidArguments(msg) => assert!(msg.contains("missing field `message`")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_arguments_mean_empty_object() {
        let store = Arc::new(UserStore::new());
        let registry = ToolRegistry::for_tool_set(ToolSet::Specific, store).unwrap();
        let out = registry.execute("search_users", "  ").await.unwrap();
        assert!(out.starts_with("Found 3 users:"));
    }

    #[tokio::test]
    async fn execute_rejects_non_object_arguments() {
        let err = registry().execute("echo", r#"["hi"]"#).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: expected a JSON object, got an array");
    }

    #[tokio::test]
    async fn execute_propagates_tool_failure() {
        let err = registry().execute("echo", r#"{"message":"fail"}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution(ref m) if m == "echo refused"));
    }
}
