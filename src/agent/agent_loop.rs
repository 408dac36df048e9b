//! Core agent loop implementation.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::{AgentConfig, Config};
use crate::llm::{ChatMessage, LlmClient, LlmError, OpenAiClient, ToolCall, ToolDefinition};
use crate::tools::{ToolError, ToolRegistry};

/// Returned when the iteration budget runs out before the model answers.
pub const FALLBACK_MESSAGE: &str = "Agent reached maximum iterations without completing the task.";

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model produced a text answer with no tool calls.
    Answered,
    /// The budget was spent without an answer.
    Exhausted,
}

/// Final output of a run plus its metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub output: String,
    pub outcome: RunOutcome,
    /// Model calls made during the run.
    pub total_iterations: usize,
    pub max_iterations_reached: bool,
}

/// The tool-calling agent.
pub struct Agent {
    config: AgentConfig,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
}

impl Agent {
    /// Create a new agent with an explicit model client.
    pub fn new(config: AgentConfig, llm: Arc<dyn LlmClient>, tools: ToolRegistry) -> Self {
        Self { config, llm, tools }
    }

    /// Create an agent talking to the endpoint named in `config`.
    pub fn from_config(config: &Config, tools: ToolRegistry) -> Result<Self, LlmError> {
        let llm = OpenAiClient::new(config.endpoint.api_key(), config.endpoint.base_url())?;
        Ok(Self::new(config.agent.clone(), Arc::new(llm), tools))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `user_message`, returning the final text.
    ///
    /// Tool failures never surface here; only a failed model call does.
    pub async fn run(&self, user_message: &str) -> Result<String, LlmError> {
        Ok(self.run_with_metrics(user_message).await?.output)
    }

    /// Answer `user_message`, returning the final text and run metrics.
    pub async fn run_with_metrics(&self, user_message: &str) -> Result<RunResult, LlmError> {
        let span = tracing::info_span!(
            "agent_run",
            model = %self.config.model,
            max_iterations = self.config.max_iterations,
        );
        self.run_loop(user_message).instrument(span).await
    }

    async fn run_loop(&self, user_message: &str) -> Result<RunResult, LlmError> {
        tracing::info!(input = %user_message, "agent run started");

        let mut messages = vec![
            ChatMessage::system(self.config.system_prompt.as_str()),
            ChatMessage::user(user_message),
        ];
        let tool_schemas = self.tools.get_tool_schemas();

        let mut answer = None;
        let mut iterations = 0;

        while answer.is_none() && iterations < self.config.max_iterations {
            iterations += 1;
            let span = tracing::info_span!("iteration", n = iterations);
            answer = self
                .iterate(&mut messages, &tool_schemas)
                .instrument(span)
                .await?;
        }

        let result = match answer {
            Some(output) => RunResult {
                output,
                outcome: RunOutcome::Answered,
                total_iterations: iterations,
                max_iterations_reached: false,
            },
            None => RunResult {
                output: FALLBACK_MESSAGE.to_string(),
                outcome: RunOutcome::Exhausted,
                total_iterations: iterations,
                max_iterations_reached: true,
            },
        };

        tracing::info!(
            output = %result.output,
            total_iterations = result.total_iterations,
            max_iterations_reached = result.max_iterations_reached,
            "agent run finished"
        );
        Ok(result)
    }

    /// One model call plus any tool dispatch. Returns the answer once there is one.
    async fn iterate(
        &self,
        messages: &mut Vec<ChatMessage>,
        tool_schemas: &[ToolDefinition],
    ) -> Result<Option<String>, LlmError> {
        if let Some(last) = messages.last() {
            tracing::debug!(
                messages = messages.len(),
                role = %last.role,
                input = %last.text().unwrap_or_default(),
                "calling model"
            );
        }

        let response = match self
            .llm
            .chat_completion(&self.config.model, messages.as_slice(), Some(tool_schemas))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "model call failed");
                return Err(e);
            }
        };

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model usage"
            );
        }

        let finish_reason = response.finish_reason.clone().unwrap_or_default();
        let message = response.into_message();
        let tool_calls = message.requested_tool_calls().to_vec();
        let text = message.text().filter(|t| !t.is_empty());
        tracing::debug!(
            output = %text.as_deref().unwrap_or_default(),
            tool_calls = ?tool_calls
                .iter()
                .map(|c| format!("{}({})", c.function.name, c.function.arguments))
                .collect::<Vec<_>>(),
            finish_reason = %finish_reason,
            "model replied"
        );
        messages.push(message);

        if !tool_calls.is_empty() {
            // Sequential: tools may touch the same store.
            for call in &tool_calls {
                let content = self.dispatch(call).await;
                messages.push(ChatMessage::tool_result(call.id.as_str(), content));
            }
            return Ok(None);
        }

        if text.is_none() {
            tracing::warn!("model returned neither content nor tool calls");
        }
        Ok(text)
    }

    /// Run one tool call, turning every failure into text for the model.
    async fn dispatch(&self, call: &ToolCall) -> String {
        let span = tracing::info_span!("tool", name = %call.function.name, call_id = %call.id);
        async {
            tracing::debug!(input = %call.function.arguments, "tool call");
            match self
                .tools
                .execute(&call.function.name, &call.function.arguments)
                .await
            {
                Ok(output) => {
                    tracing::debug!(output = %output, "tool finished");
                    output
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tool failed");
                    render_tool_error(&e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn render_tool_error(err: &ToolError) -> String {
    match err {
        ToolError::NotFound(name) => format!("Error: Tool {} not found", name),
        other => format!("Error executing tool: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, ContentPart, MessageContent, Role, ScriptedLlm};
    use crate::tools::ToolSet;
    use crate::users::UserStore;
    use serde_json::json;
    use std::fmt::{self, Write as _};
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    fn agent(llm: &Arc<ScriptedLlm>, max_iterations: usize) -> Agent {
        let store = Arc::new(UserStore::new().with_notify_delay(Duration::ZERO));
        let tools = ToolRegistry::for_tool_set(ToolSet::Specific, store).unwrap();
        let llm: Arc<dyn LlmClient> = llm.clone();
        Agent::new(
            AgentConfig::new("test-model").with_max_iterations(max_iterations),
            llm,
            tools,
        )
    }

    fn call(id: &str, name: &str, args: &str) -> ChatResponse {
        ChatResponse::with_tool_calls(vec![ToolCall::new(id, name, args)])
    }

    #[tokio::test]
    async fn answers_after_one_tool_round() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("call_1", "search_users", r#"{"query":"John"}"#),
            ChatResponse::text("Here is what I found: John Smith"),
        ]));
        let agent = agent(&llm, 10);

        let result = agent.run_with_metrics("find users named John").await.unwrap();
        assert_eq!(result.output, "Here is what I found: John Smith");
        assert_eq!(result.outcome, RunOutcome::Answered);
        assert_eq!(result.total_iterations, 2);
        assert!(!result.max_iterations_reached);

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].tools.len(), 4);

        let transcript = &requests[1].messages;
        let roles: Vec<Role> = transcript.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(transcript[1].text().as_deref(), Some("find users named John"));
        assert_eq!(transcript[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(transcript[3].text().unwrap().starts_with("Found 1 user:"));
    }

    #[tokio::test]
    async fn tool_output_is_passed_through_unchanged() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("call_1", "get_user_details", r#"{"email":"jane@co.com"}"#),
            ChatResponse::text("done"),
        ]));
        let agent = agent(&llm, 10);
        agent.run("details for jane").await.unwrap();

        let expected = agent
            .tools()
            .execute("get_user_details", r#"{"email":"jane@co.com"}"#)
            .await
            .unwrap();
        assert_eq!(llm.requests()[1].messages[3].text(), Some(expected));
    }

    #[tokio::test]
    async fn single_iteration_budget_is_exhausted() {
        let llm = Arc::new(ScriptedLlm::repeating(call("c", "search_users", "{}")));
        let agent = agent(&llm, 1);

        let result = agent.run_with_metrics("anything").await.unwrap();
        assert_eq!(result.output, FALLBACK_MESSAGE);
        assert_eq!(result.outcome, RunOutcome::Exhausted);
        assert_eq!(result.total_iterations, 1);
        assert!(result.max_iterations_reached);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn never_exceeds_budget() {
        let llm = Arc::new(ScriptedLlm::repeating(call("c", "search_users", "{}")));
        let result = agent(&llm, 3).run_with_metrics("loop forever").await.unwrap();
        assert_eq!(result.total_iterations, 3);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn answer_on_last_iteration_is_not_exhaustion() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("c", "search_users", "{}"),
            ChatResponse::text("All users listed."),
        ]));
        let result = agent(&llm, 2).run_with_metrics("list users").await.unwrap();
        assert_eq!(result.outcome, RunOutcome::Answered);
        assert_eq!(result.total_iterations, 2);
        assert!(!result.max_iterations_reached);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("call_x", "delete_everything", "{}"),
            ChatResponse::text("I can't do that."),
        ]));
        let output = agent(&llm, 10).run("wipe it").await.unwrap();
        assert_eq!(output, "I can't do that.");

        let tool_msg = &llm.requests()[1].messages[3];
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_x"));
        assert_eq!(
            tool_msg.text().as_deref(),
            Some("Error: Tool delete_everything not found")
        );
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported_and_loop_continues() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call("c1", "search_users", r#"{"subscriptionPlan":"gold"}"#),
            call("c2", "get_user_details", "not json"),
            ChatResponse::text("Sorry."),
        ]));
        let result = agent(&llm, 10).run_with_metrics("gold users").await.unwrap();
        assert_eq!(result.total_iterations, 3);

        let messages = &llm.requests()[2].messages;
        let first = messages[3].text().unwrap();
        assert!(first.starts_with("Error executing tool: "));
        assert!(first.contains("unknown variant `gold`"));

        let second = messages[5].text().unwrap();
        assert!(second.starts_with("Error executing tool: invalid arguments:"));
    }

    #[tokio::test]
    async fn tool_calls_run_in_request_order() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ChatResponse::with_tool_calls(vec![
                ToolCall::new("a", "update_subscription", r#"{"email":"jane@co.com","plan":"premium"}"#),
                ToolCall::new("b", "get_user_details", r#"{"email":"jane@co.com"}"#),
                ToolCall::new("c", "missing_tool", "{}"),
            ]),
            ChatResponse::text("Upgraded."),
        ]));
        agent(&llm, 10).run("upgrade jane").await.unwrap();

        let messages = &llm.requests()[1].messages;
        assert_eq!(messages.len(), 6);
        let ids: Vec<_> = messages[3..]
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        // The details lookup sees the upgrade made by the first call.
        assert!(messages[4].text().unwrap().contains("- Plan: premium"));
    }

    #[tokio::test]
    async fn empty_reply_spends_an_iteration() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            ChatResponse::default(),
            ChatResponse::text(""),
            ChatResponse::text("finally"),
        ]));
        let result = agent(&llm, 5).run_with_metrics("hello").await.unwrap();
        assert_eq!(result.output, "finally");
        assert_eq!(result.total_iterations, 3);
    }

    #[tokio::test]
    async fn empty_replies_can_exhaust_budget() {
        let llm = Arc::new(ScriptedLlm::repeating(ChatResponse::default()));
        let result = agent(&llm, 2).run_with_metrics("hello").await.unwrap();
        assert_eq!(result.output, FALLBACK_MESSAGE);
        assert!(result.max_iterations_reached);
    }

    #[tokio::test]
    async fn content_with_tool_calls_keeps_running() {
        let mut first = call("c", "search_users", "{}");
        first.content = Some(MessageContent::from("Let me look that up."));
        let llm = Arc::new(ScriptedLlm::new(vec![first, ChatResponse::text("Done.")]));

        let result = agent(&llm, 10).run_with_metrics("users?").await.unwrap();
        assert_eq!(result.output, "Done.");
        assert_eq!(result.total_iterations, 2);
    }

    #[tokio::test]
    async fn multi_part_answer_joins_text_parts() {
        let reply = ChatResponse {
            content: Some(MessageContent::Parts(vec![
                ContentPart::text("Hello, "),
                ContentPart::Other(json!({"type": "image_url", "image_url": {"url": "https://example.com/a.png"}})),
                ContentPart::text("world"),
            ])),
            ..Default::default()
        };
        let llm = Arc::new(ScriptedLlm::new(vec![reply]));
        assert_eq!(agent(&llm, 10).run("hi").await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn parts_without_text_are_not_an_answer() {
        let reply = ChatResponse {
            content: Some(MessageContent::Parts(vec![ContentPart::Other(json!({"type": "refusal", "refusal": "no"}))])),
            ..Default::default()
        };
        let llm = Arc::new(ScriptedLlm::new(vec![reply, ChatResponse::text("ok")]));
        let result = agent(&llm, 10).run_with_metrics("hi").await.unwrap();
        assert_eq!(result.output, "ok");
        assert_eq!(result.total_iterations, 2);
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::from_steps(vec![
            Ok(call("c", "search_users", "{}")),
            Err(LlmError::RateLimited("slow down".to_string())),
        ]));
        let err = agent(&llm, 10).run("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(ref m) if m == "slow down"));
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn tool_errors_render_fixed_templates() {
        assert_eq!(
            render_tool_error(&ToolError::NotFound("x".into())),
            "Error: Tool x not found"
        );
        assert_eq!(
            render_tool_error(&ToolError::execution("disk full")),
            "Error executing tool: disk full"
        );
    }

    /// Event recorded by [`Capture`]: enclosing span names plus rendered fields.
    #[derive(Debug, Clone)]
    struct CapturedEvent {
        spans: Vec<String>,
        fields: String,
    }

    struct Capture(Arc<Mutex<Vec<CapturedEvent>>>);

    struct FieldText(String);

    impl Visit for FieldText {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            let _ = write!(self.0, "{}={:?} ", field.name(), value);
        }
    }

    impl<S> Layer<S> for Capture
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
            let spans = ctx
                .event_scope(event)
                .map(|scope| scope.from_root().map(|s| s.name().to_string()).collect())
                .unwrap_or_default();
            let mut fields = FieldText(String::new());
            event.record(&mut fields);
            self.0.lock().unwrap().push(CapturedEvent {
                spans,
                fields: fields.0,
            });
        }
    }

    #[tokio::test]
    async fn model_calls_are_traced_with_input_and_output() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&events)));
        let _guard = tracing::subscriber::set_default(subscriber);

        let llm = Arc::new(ScriptedLlm::new(vec![
            call("call_1", "search_users", r#"{"query":"John"}"#),
            ChatResponse::text("Here is what I found: John Smith"),
        ]));
        agent(&llm, 10).run("find users named John").await.unwrap();

        let events = events.lock().unwrap().clone();
        let in_iteration = |needle: &str| {
            events.iter().any(|e| {
                e.spans == ["agent_run", "iteration"] && e.fields.contains(needle)
            })
        };

        assert!(in_iteration("input=find users named John"));
        assert!(in_iteration(r#"search_users({\"query\":\"John\"})"#));
        assert!(in_iteration("output=Here is what I found: John Smith"));
        assert!(events.iter().any(|e| {
            e.spans == ["agent_run", "iteration", "tool"] && e.fields.contains("output=Found 1 user:")
        }));
        assert!(events
            .iter()
            .any(|e| e.spans == ["agent_run"] && e.fields.contains("total_iterations=2")));
    }
}
