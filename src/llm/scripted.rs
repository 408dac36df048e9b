//! Deterministic model client that replays canned responses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolDefinition};

/// One request as seen by the scripted model.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// A model client that answers from a script instead of a network endpoint.
///
/// Steps are consumed in order. Once the queue is empty the `repeat`
/// response (if any) is returned forever; otherwise the call fails.
pub struct ScriptedLlm {
    steps: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedLlm {
    /// Replay `responses` in order.
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self::from_steps(responses.into_iter().map(Ok).collect())
    }

    /// Replay responses and failures in order.
    pub fn from_steps(steps: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `response` on every call.
    pub fn repeating(response: ChatResponse) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                model: model.to_string(),
                messages: messages.to_vec(),
                tools: tools.map(<[ToolDefinition]>::to_vec).unwrap_or_default(),
            });
        }

        let next = self
            .steps
            .lock()
            .map_err(|_| LlmError::Other("scripted model lock poisoned".to_string()))?
            .pop_front();

        match (next, &self.repeat) {
            (Some(step), _) => step,
            (None, Some(response)) => Ok(response.clone()),
            (None, None) => Err(LlmError::Other(
                "scripted model has no responses left".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_then_fails() {
        let llm = ScriptedLlm::new(vec![ChatResponse::text("one")]);
        let first = llm.chat_completion("m", &[], None).await.unwrap();
        assert_eq!(first.content.unwrap().text(), "one");
        assert!(llm.chat_completion("m", &[], None).await.is_err());
        assert_eq!(llm.call_count(), 2);
    }

    #[test]
    fn repeating_never_runs_out() {
        let llm = ScriptedLlm::repeating(ChatResponse::text("again"));
        for _ in 0..3 {
            let response =
                tokio_test::block_on(llm.chat_completion("m", &[ChatMessage::user("hi")], None))
                    .unwrap();
            assert_eq!(response.content.unwrap().text(), "again");
        }
        assert_eq!(llm.requests()[2].messages.len(), 1);
    }
}
