//! In-memory customer store backing the customer-service tools.
//!
//! Every operation returns human-readable text alongside structured data, so
//! tools can hand results straight back to the model.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }

    /// Capitalized label used in listings ("Premium").
    pub fn label(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Basic => "Basic",
            Plan::Premium => "Premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle action on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Renew,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub subscription: Subscription,
    pub last_login: DateTime<Utc>,
}

/// A notification that was "sent" to a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub email: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Search filters. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub users: Vec<User>,
    pub formatted: String,
}

#[derive(Debug, Clone)]
pub struct UserDetails {
    pub user: Option<User>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Customer store shared by the tools of one agent.
pub struct UserStore {
    users: RwLock<Vec<User>>,
    notifications: RwLock<Vec<Notification>>,
    notify_delay: Duration,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    /// A store seeded with the demo customers.
    pub fn new() -> Self {
        Self::with_users(seed_users())
    }

    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: RwLock::new(users),
            notifications: RwLock::new(Vec::new()),
            notify_delay: Duration::from_millis(500),
        }
    }

    /// Simulated delivery latency for notifications.
    pub fn with_notify_delay(mut self, delay: Duration) -> Self {
        self.notify_delay = delay;
        self
    }

    /// Snapshot of all users.
    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    /// Notifications sent so far, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub async fn search_users(&self, params: &SearchParams) -> SearchResult {
        let query = params
            .query
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let users: Vec<User> = self
            .users
            .read()
            .await
            .iter()
            .filter(|u| match &query {
                Some(q) => u.name.to_lowercase().contains(q) || u.email.to_lowercase().contains(q),
                None => true,
            })
            .filter(|u| params.plan.map_or(true, |p| u.subscription.plan == p))
            .filter(|u| params.status.map_or(true, |s| u.subscription.status == s))
            .cloned()
            .collect();

        if users.is_empty() {
            return SearchResult {
                users,
                formatted: "No users found matching the criteria.".to_string(),
            };
        }

        let now = Utc::now();
        let entries = users
            .iter()
            .enumerate()
            .map(|(i, u)| {
                let status = match u.subscription.status {
                    SubscriptionStatus::Active => {
                        format!("active until {}", u.subscription.expires.format("%d/%m/%Y"))
                    }
                    SubscriptionStatus::Expired => "expired".to_string(),
                };
                format!(
                    "{}. {} ({})\n   - {} subscriber ({})\n   - Last seen: {}",
                    i + 1,
                    u.name,
                    u.email,
                    u.subscription.plan.label(),
                    status,
                    format_relative(u.last_login, now)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let count = users.len();
        let formatted = format!(
            "Found {} user{}:\n\n{}",
            count,
            if count == 1 { "" } else { "s" },
            entries
        );

        SearchResult { users, formatted }
    }

    pub async fn get_user_details(&self, email: &str) -> UserDetails {
        let Some(user) = self.find_by_email(email).await else {
            return UserDetails {
                user: None,
                formatted: format!("No user found with email: {}", email),
            };
        };

        let status_label = match user.subscription.status {
            SubscriptionStatus::Active => "Expires",
            SubscriptionStatus::Expired => "Expired",
        };
        let created = account_created(user.id);

        let formatted = format!(
            "User Details for {name}:\n\n\
             Email: {email}\n\
             User ID: {id}\n\n\
             Subscription:\n\
             - Plan: {plan}\n\
             - Status: {status}\n\
             - {status_label}: {expires}\n\n\
             Activity:\n\
             - Last login: {last_login}\n\
             - Account created: {created}",
            name = user.name,
            email = user.email,
            id = user.id,
            plan = user.subscription.plan,
            status = user.subscription.status,
            status_label = status_label,
            expires = user.subscription.expires.format("%d/%m/%Y"),
            last_login = user.last_login.format("%d/%m/%Y, %H:%M:%S"),
            created = created.format("%d/%m/%Y"),
        );

        UserDetails {
            user: Some(user),
            formatted,
        }
    }

    pub async fn notify_user(&self, email: &str, message: &str) -> OperationResult {
        if self.find_by_email(email).await.is_none() {
            return OperationResult::failed(format!(
                "❌ Failed to send notification: Customer with email {} not found",
                email
            ));
        }

        if !self.notify_delay.is_zero() {
            tokio::time::sleep(self.notify_delay).await;
        }

        self.notifications.write().await.push(Notification {
            email: email.to_string(),
            message: message.to_string(),
            sent_at: Utc::now(),
        });
        tracing::info!(email, "notification sent");

        OperationResult::ok(format!("✓ Sent update to {}: \"{}\"", email, message))
    }

    pub async fn update_subscription(
        &self,
        email: &str,
        plan: Option<Plan>,
        action: Option<SubscriptionAction>,
    ) -> OperationResult {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.email == email) else {
            return OperationResult::failed(format!(
                "❌ Failed to update subscription: Customer with email {} not found",
                email
            ));
        };

        let mut updates = Vec::new();

        if let Some(plan) = plan {
            if plan != user.subscription.plan {
                user.subscription.plan = plan;
                updates.push(format!("plan changed to {}", plan));
            }
        }

        match action {
            Some(SubscriptionAction::Renew) => {
                user.subscription.status = SubscriptionStatus::Active;
                user.subscription.expires = Utc::now() + chrono::Duration::days(365);
                updates.push("subscription renewed for 1 year".to_string());
            }
            Some(SubscriptionAction::Cancel) => {
                user.subscription.status = SubscriptionStatus::Expired;
                updates.push("subscription cancelled".to_string());
            }
            None => {}
        }

        if updates.is_empty() {
            return OperationResult::ok(format!("No changes made to {}'s subscription.", user.name));
        }

        tracing::info!(email, changes = %updates.join(", "), "subscription updated");
        OperationResult::ok(format!(
            "✓ Updated {}'s subscription: {}",
            user.name,
            updates.join(", ")
        ))
    }
}

/// Human-friendly age of `date` relative to `now`.
pub fn format_relative(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    match (now - date).num_days() {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        days @ 2..=6 => format!("{} days ago", days),
        _ => date.format("%d/%m/%Y").to_string(),
    }
}

/// Synthetic account creation date: fifteen days apart per user id, from 2024-01-01.
fn account_created(id: u32) -> NaiveDate {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let offset = (u64::from(id) * 15).saturating_sub(1);
    start.checked_add_days(Days::new(offset)).unwrap_or(start)
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .single()
        .unwrap_or_default()
}

/// The demo customers.
pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: 1,
            name: "John Smith".to_string(),
            email: "john@co.com".to_string(),
            subscription: Subscription {
                plan: Plan::Premium,
                status: SubscriptionStatus::Active,
                expires: utc(2025, 1, 15, 8, 30),
            },
            last_login: utc(2024, 3, 20, 14, 22),
        },
        User {
            id: 2,
            name: "Jane Doe".to_string(),
            email: "jane@co.com".to_string(),
            subscription: Subscription {
                plan: Plan::Basic,
                status: SubscriptionStatus::Active,
                expires: utc(2024, 8, 20, 10, 15),
            },
            last_login: utc(2024, 3, 19, 9, 45),
        },
        User {
            id: 3,
            name: "Bob Wilson".to_string(),
            email: "bob@co.com".to_string(),
            subscription: Subscription {
                plan: Plan::Premium,
                status: SubscriptionStatus::Expired,
                expires: utc(2024, 2, 1, 12, 0),
            },
            last_login: utc(2024, 1, 30, 16, 0),
        },
    ]
}
