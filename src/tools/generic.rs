//! Generic API-wrapper tools.
//!
//! These expose the same store through broad, many-parameter interfaces
//! (`source`, `operation`, `identifierType`, ...). Only a narrow slice of the
//! advertised surface actually works; everything else answers with an
//! `Error: ...` string the model has to recover from. They exist so the
//! evaluation harness can compare them against the purpose-built tools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_args, Tool, ToolError};
use crate::users::{Plan, SearchParams, SubscriptionAction, SubscriptionStatus, UserStore};

/// All generic tools, sharing one store.
pub fn generic_tools(store: Arc<UserStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(QueryData::new(Arc::clone(&store))),
        Arc::new(SendMessage::new(Arc::clone(&store))),
        Arc::new(AccessRecord::new(Arc::clone(&store))),
        Arc::new(ModifyRecord::new(store)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum QueryOperation {
    #[serde(rename = "find")]
    Find,
    #[serde(rename = "findOne")]
    FindOne,
    #[serde(rename = "count")]
    Count,
    #[serde(rename = "aggregate")]
    Aggregate,
}

impl QueryOperation {
    fn as_str(&self) -> &'static str {
        match self {
            QueryOperation::Find => "find",
            QueryOperation::FindOne => "findOne",
            QueryOperation::Count => "count",
            QueryOperation::Aggregate => "aggregate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum CacheControl {
    NoCache,
    Cache,
    CacheAndRefresh,
}

// Fields the tool ignores are still decoded so bad values are rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct QueryDataArgs {
    source: String,
    operation: QueryOperation,
    #[serde(default)]
    filters: Option<Map<String, Value>>,
    #[serde(default)]
    projection: Option<Vec<String>>,
    #[serde(default)]
    sort: Option<HashMap<String, i64>>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    skip: Option<u64>,
    #[serde(default)]
    include_metadata: Option<bool>,
    #[serde(default)]
    cache_control: Option<CacheControl>,
    #[serde(default)]
    timeout: Option<u64>,
}

/// Query data from "any" data source.
pub struct QueryData {
    store: Arc<UserStore>,
}

impl QueryData {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for QueryData {
    fn name(&self) -> &str {
        "query_data"
    }

    fn description(&self) -> &str {
        "Query data from any data source"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string", "description": "Data source to query (e.g., 'users', 'orders', 'products')"},
                "operation": {"type": "string", "enum": ["find", "findOne", "count", "aggregate"], "description": "Query operation type"},
                "filters": {"type": "object", "description": "Filter criteria as key-value pairs"},
                "projection": {"type": "array", "items": {"type": "string"}, "description": "Fields to include in response"},
                "sort": {"type": "object", "additionalProperties": {"type": "integer"}, "description": "Sort order (-1 for desc, 1 for asc)"},
                "limit": {"type": "integer", "description": "Maximum number of results"},
                "skip": {"type": "integer", "description": "Number of results to skip"},
                "includeMetadata": {"type": "boolean", "description": "Include query metadata in response"},
                "cacheControl": {"type": "string", "enum": ["no-cache", "cache", "cache-and-refresh"]},
                "timeout": {"type": "integer", "description": "Query timeout in milliseconds"}
            },
            "required": ["source", "operation"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: QueryDataArgs = parse_args(args)?;

        if args.source != "users" {
            return Ok(format!(
                "Error: Data source '{}' not found. Available sources: users",
                args.source
            ));
        }
        if args.operation != QueryOperation::Find {
            return Ok(format!(
                "Error: Operation '{}' not supported for user queries. Use 'find' instead.",
                args.operation.as_str()
            ));
        }

        let filters = args.filters.unwrap_or_default();
        let params = SearchParams {
            query: filters.get("query").and_then(value_to_query),
            plan: filters
                .get("subscription_plan")
                .and_then(|v| serde_json::from_value::<Plan>(v.clone()).ok())
                .filter(|p| matches!(p, Plan::Basic | Plan::Premium)),
            status: filters
                .get("subscription_status")
                .and_then(|v| serde_json::from_value::<SubscriptionStatus>(v.clone()).ok()),
        };
        let result = self.store.search_users(&params).await;

        if args.include_metadata.unwrap_or(false) {
            let dump = json!({
                "query_metadata": {
                    "execution_time_ms": 23,
                    "source": args.source,
                    "operation": args.operation.as_str(),
                    "filters_applied": filters.keys().collect::<Vec<_>>(),
                    "cache_hit": false,
                },
                "result_count": result.users.len(),
                "results": result.users.iter().map(|u| json!({
                    "id": u.id,
                    "name": u.name,
                    "email": u.email,
                    "subscription": {
                        "plan": u.subscription.plan,
                        "status": u.subscription.status,
                    }
                })).collect::<Vec<_>>(),
            });
            return Ok(dump.to_string());
        }

        Ok(format!(
            "{}\n\nNeed more details? Use 'query_data' with operation='findOne' and the user's email.",
            result.formatted
        ))
    }
}

/// Non-empty filter value rendered as a search string.
fn value_to_query(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Channel {
    Email,
    Sms,
    Push,
    InApp,
    Webhook,
}

impl Channel {
    fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::InApp => "in-app",
            Channel::Webhook => "webhook",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

// Fields the tool ignores are still decoded so bad values are rejected.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct SendMessageArgs {
    channel: Channel,
    recipient: String,
    content: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    variables: Option<HashMap<String, String>>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    scheduling: Option<HashMap<String, String>>,
    #[serde(default)]
    tracking: Option<HashMap<String, bool>>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// Send a message through "any" communication channel.
pub struct SendMessage {
    store: Arc<UserStore>,
}

impl SendMessage {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SendMessage {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Send a message through any communication channel"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string", "enum": ["email", "sms", "push", "in-app", "webhook"], "description": "Communication channel"},
                "recipient": {"type": "string", "description": "Recipient identifier (email, phone, user ID, etc.)"},
                "content": {"type": "string", "description": "Message content"},
                "subject": {"type": "string", "description": "Message subject (for email)"},
                "template": {"type": "string", "description": "Template ID to use"},
                "variables": {"type": "object", "additionalProperties": {"type": "string"}, "description": "Template variables"},
                "priority": {"type": "string", "enum": ["low", "normal", "high", "urgent"]},
                "scheduling": {"type": "object", "additionalProperties": {"type": "string"}},
                "tracking": {"type": "object", "additionalProperties": {"type": "boolean"}},
                "metadata": {"type": "object", "additionalProperties": {"type": "string"}, "description": "Additional metadata"}
            },
            "required": ["channel", "recipient", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: SendMessageArgs = parse_args(args)?;

        if args.channel != Channel::Email {
            return Ok(format!(
                "Error: Channel '{}' is not configured. Please use 'email'.",
                args.channel.as_str()
            ));
        }
        if let Some(priority) = args.priority.filter(|p| *p != Priority::Normal) {
            return Ok(format!(
                "Error: Priority '{}' requires additional configuration. Use 'normal' priority.",
                priority.as_str()
            ));
        }

        let result = self.store.notify_user(&args.recipient, &args.content).await;
        Ok(result.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum IdentifierType {
    Id,
    Email,
    Uuid,
    Custom,
}

impl IdentifierType {
    fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Id => "id",
            IdentifierType::Email => "email",
            IdentifierType::Uuid => "uuid",
            IdentifierType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RecordFormat {
    Json,
    Xml,
    Plain,
}

// Fields the tool ignores are still decoded so bad values are rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct AccessRecordArgs {
    source: String,
    identifier: String,
    identifier_type: IdentifierType,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    include_related: Option<bool>,
    #[serde(default)]
    format: Option<RecordFormat>,
}

/// Access a specific record from "any" data source.
pub struct AccessRecord {
    store: Arc<UserStore>,
}

impl AccessRecord {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for AccessRecord {
    fn name(&self) -> &str {
        "access_record"
    }

    fn description(&self) -> &str {
        "Access a specific record from any data source"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string", "description": "Data source (e.g., 'users', 'orders')"},
                "identifier": {"type": "string", "description": "Record identifier"},
                "identifierType": {"type": "string", "enum": ["id", "email", "uuid", "custom"], "description": "Type of identifier"},
                "fields": {"type": "array", "items": {"type": "string"}, "description": "Specific fields to retrieve"},
                "includeRelated": {"type": "boolean", "description": "Include related records"},
                "format": {"type": "string", "enum": ["json", "xml", "plain"], "description": "Response format"}
            },
            "required": ["source", "identifier", "identifierType"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: AccessRecordArgs = parse_args(args)?;

        if args.source != "users" {
            return Ok(format!("Error: Source '{}' not available. Use 'users'.", args.source));
        }
        if args.identifier_type != IdentifierType::Email {
            return Ok(format!(
                "Error: Identifier type '{}' not supported for users. Use 'email'.",
                args.identifier_type.as_str()
            ));
        }

        let details = self.store.get_user_details(&args.identifier).await;
        Ok(format!(
            "{}\n\nActions available:\n\
             - Use 'send_message' to notify them\n\
             - Use 'modify_record' to update their subscription",
            details.formatted
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ModifyOperation {
    Update,
    Patch,
    Replace,
    Merge,
}

impl ModifyOperation {
    fn as_str(&self) -> &'static str {
        match self {
            ModifyOperation::Update => "update",
            ModifyOperation::Patch => "patch",
            ModifyOperation::Replace => "replace",
            ModifyOperation::Merge => "merge",
        }
    }
}

// Fields the tool ignores are still decoded so bad values are rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct ModifyRecordArgs {
    source: String,
    identifier: String,
    identifier_type: IdentifierType,
    operation: ModifyOperation,
    data: Map<String, Value>,
    #[serde(default)]
    validate: Option<bool>,
    #[serde(default)]
    return_updated: Option<bool>,
    #[serde(default)]
    audit_log: Option<bool>,
}

/// Modify a record in "any" data source.
pub struct ModifyRecord {
    store: Arc<UserStore>,
}

impl ModifyRecord {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ModifyRecord {
    fn name(&self) -> &str {
        "modify_record"
    }

    fn description(&self) -> &str {
        "Modify a record in any data source"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {"type": "string", "description": "Data source (e.g., 'users', 'orders')"},
                "identifier": {"type": "string", "description": "Record identifier"},
                "identifierType": {"type": "string", "enum": ["id", "email", "uuid", "custom"], "description": "Type of identifier"},
                "operation": {"type": "string", "enum": ["update", "patch", "replace", "merge"], "description": "Modification operation"},
                "data": {"type": "object", "description": "Data to update"},
                "validate": {"type": "boolean", "description": "Validate before updating"},
                "returnUpdated": {"type": "boolean", "description": "Return the updated record"},
                "auditLog": {"type": "boolean", "description": "Create audit log entry"}
            },
            "required": ["source", "identifier", "identifierType", "operation", "data"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ModifyRecordArgs = parse_args(args)?;

        if args.source != "users" {
            return Ok(format!(
                "Error: Source '{}' not available for modifications. Use 'users'.",
                args.source
            ));
        }
        if args.identifier_type != IdentifierType::Email {
            return Ok(format!(
                "Error: Identifier type '{}' not supported. Use 'email'.",
                args.identifier_type.as_str()
            ));
        }
        if args.operation != ModifyOperation::Update {
            return Ok(format!(
                "Error: Operation '{}' not supported. Use 'update'.",
                args.operation.as_str()
            ));
        }

        // Unrecognized values are dropped silently, like the wrapped API does.
        let plan = args
            .data
            .get("plan")
            .and_then(|v| serde_json::from_value::<Plan>(v.clone()).ok())
            .filter(|p| matches!(p, Plan::Basic | Plan::Premium));
        let action = args
            .data
            .get("action")
            .and_then(|v| serde_json::from_value::<SubscriptionAction>(v.clone()).ok());

        let result = self
            .store
            .update_subscription(&args.identifier, plan, action)
            .await;
        Ok(result.message)
    }
}
