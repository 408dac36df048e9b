//! # Tool Loop Agent
//!
//! A customer-service agent that answers a request by calling a language
//! model in a loop and running the tools it asks for.
//!
//! This library provides:
//! - An orchestration loop with an iteration budget and a fixed fallback answer
//! - A tool registry with typed argument decoding
//! - Two tool catalogues over an in-memory customer store
//! - An evaluation harness comparing the catalogues
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Start a transcript with the system prompt and the user message
//! 2. Call the model with the tool catalogue
//! 3. Run any requested tools in order and append their results
//! 4. Repeat until the model answers or the budget runs out
//!
//! Tool failures are reported back to the model as text. Only a failed model
//! call ends a run with an error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tool_loop_agent::{agent::Agent, config::Config, tools::{ToolRegistry, ToolSet}, users::UserStore};
//!
//! let config = Config::from_env()?;
//! let tools = ToolRegistry::for_tool_set(ToolSet::Specific, Arc::new(UserStore::new()))?;
//! let agent = Agent::from_config(&config, tools)?;
//! let answer = agent.run("Search for users with basic plans").await?;
//! ```

pub mod agent;
pub mod config;
pub mod eval;
pub mod llm;
pub mod tools;
pub mod users;

pub use config::Config;
