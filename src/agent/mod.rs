//! Agent module - the tool orchestration loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user message
//! 2. Call the model with the tool catalogue
//! 3. If the model requests tool calls, run them in order and feed results back
//! 4. Repeat until the model answers or the iteration budget runs out

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, RunOutcome, RunResult, FALLBACK_MESSAGE};
pub use prompt::{CUSTOMER_SERVICE_PROMPT, EVAL_SYSTEM_PROMPT};
