//! Purpose-built customer-service tools.
//!
//! Each tool maps to exactly one store operation, takes only the arguments
//! that operation needs, and answers in plain text with a hint about what
//! the model can do next.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool, ToolError};
use crate::users::{Plan, SearchParams, SubscriptionAction, SubscriptionStatus, UserStore};

/// All purpose-built tools, sharing one store.
pub fn customer_tools(store: Arc<UserStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(NotifyCustomer::new(Arc::clone(&store))),
        Arc::new(SearchUsers::new(Arc::clone(&store))),
        Arc::new(GetUserDetails::new(Arc::clone(&store))),
        Arc::new(UpdateSubscription::new(store)),
    ]
}

/// Send a notification email to a customer.
pub struct NotifyCustomer {
    store: Arc<UserStore>,
}

impl NotifyCustomer {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotifyCustomerArgs {
    customer_email: String,
    message: String,
}

#[async_trait]
impl Tool for NotifyCustomer {
    fn name(&self) -> &str {
        "notify_customer"
    }

    fn description(&self) -> &str {
        "Send a notification email to a customer about their order or account"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "customerEmail": {
                    "type": "string",
                    "description": "Customer's email address"
                },
                "message": {
                    "type": "string",
                    "description": "The update message to send to the customer"
                }
            },
            "required": ["customerEmail", "message"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: NotifyCustomerArgs = parse_args(args)?;
        let result = self
            .store
            .notify_user(&args.customer_email, &args.message)
            .await;
        Ok(result.message)
    }
}

/// Search users by name/email and subscription filters.
pub struct SearchUsers {
    store: Arc<UserStore>,
}

impl SearchUsers {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchUsersArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    subscription_plan: Option<Plan>,
    #[serde(default)]
    subscription_status: Option<SubscriptionStatus>,
}

#[async_trait]
impl Tool for SearchUsers {
    fn name(&self) -> &str {
        "search_users"
    }

    fn description(&self) -> &str {
        "Search for users by various criteria"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query to match against user names or emails"
                },
                "subscriptionPlan": {
                    "type": "string",
                    "enum": ["free", "basic", "premium"],
                    "description": "Filter by subscription plan"
                },
                "subscriptionStatus": {
                    "type": "string",
                    "enum": ["active", "expired"],
                    "description": "Filter by subscription status"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: SearchUsersArgs = parse_args(args)?;
        let result = self
            .store
            .search_users(&SearchParams {
                query: args.query,
                plan: args.subscription_plan,
                status: args.subscription_status,
            })
            .await;

        Ok(format!(
            "{}\n\nNeed more details? Use 'get_user_details' with the user's email.",
            result.formatted
        ))
    }
}

/// Full account details for one customer.
pub struct GetUserDetails {
    store: Arc<UserStore>,
}

impl GetUserDetails {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct GetUserDetailsArgs {
    email: String,
}

#[async_trait]
impl Tool for GetUserDetails {
    fn name(&self) -> &str {
        "get_user_details"
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific user"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "User's email address"
                }
            },
            "required": ["email"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: GetUserDetailsArgs = parse_args(args)?;
        let details = self.store.get_user_details(&args.email).await;

        Ok(format!(
            "{}\n\nActions available:\n\
             - Use 'notify_customer' to send them an email\n\
             - Use 'update_subscription' to modify their plan",
            details.formatted
        ))
    }
}

/// Change a customer's plan, or renew/cancel their subscription.
pub struct UpdateSubscription {
    store: Arc<UserStore>,
}

impl UpdateSubscription {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSubscriptionArgs {
    email: String,
    #[serde(default)]
    plan: Option<Plan>,
    #[serde(default)]
    action: Option<SubscriptionAction>,
}

#[async_trait]
impl Tool for UpdateSubscription {
    fn name(&self) -> &str {
        "update_subscription"
    }

    fn description(&self) -> &str {
        "Update a customer's subscription plan or status"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email": {
                    "type": "string",
                    "description": "Customer's email address"
                },
                "plan": {
                    "type": "string",
                    "enum": ["free", "basic", "premium"],
                    "description": "New subscription plan"
                },
                "action": {
                    "type": "string",
                    "enum": ["renew", "cancel"],
                    "description": "Action to take on subscription"
                }
            },
            "required": ["email"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: UpdateSubscriptionArgs = parse_args(args)?;
        let result = self
            .store
            .update_subscription(&args.email, args.plan, args.action)
            .await;
        Ok(result.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store() -> Arc<UserStore> {
        Arc::new(UserStore::new().with_notify_delay(Duration::ZERO))
    }

    #[tokio::test]
    async fn search_appends_hint() {
        let tool = SearchUsers::new(store());
        let out = tool
            .execute(json!({"subscriptionPlan": "basic"}))
            .await
            .unwrap();
        assert!(out.starts_with("Found 1 user:"));
        assert!(out.contains("Jane Doe (jane@co.com)"));
        assert!(out.ends_with("Use 'get_user_details' with the user's email."));
    }

    #[tokio::test]
    async fn search_rejects_unknown_plan() {
        let tool = SearchUsers::new(store());
        let err = tool
            .execute(json!({"subscriptionPlan": "gold"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("gold")));
    }

    #[tokio::test]
    async fn details_lists_follow_up_actions() {
        let tool = GetUserDetails::new(store());
        let out = tool.execute(json!({"email": "john@co.com"})).await.unwrap();
        assert!(out.starts_with("User Details for John Smith:"));
        assert!(out.contains("- Use 'notify_customer' to send them an email"));
    }

    #[tokio::test]
    async fn notify_uses_camel_case_email() {
        let store = store();
        let tool = NotifyCustomer::new(Arc::clone(&store));
        let out = tool
            .execute(json!({"customerEmail": "bob@co.com", "message": "Renew today"}))
            .await
            .unwrap();
        assert_eq!(out, "✓ Sent update to bob@co.com: \"Renew today\"");
        assert_eq!(store.notifications().await.len(), 1);

        let err = tool
            .execute(json!({"email": "bob@co.com", "message": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn update_cancels_subscription() {
        let store = store();
        let tool = UpdateSubscription::new(Arc::clone(&store));
        let out = tool
            .execute(json!({"email": "jane@co.com", "action": "cancel"}))
            .await
            .unwrap();
        assert_eq!(out, "✓ Updated Jane Doe's subscription: subscription cancelled");

        let jane = store.find_by_email("jane@co.com").await.unwrap();
        assert_eq!(jane.subscription.status, SubscriptionStatus::Expired);
    }
}
