//! LlmClient - consumed capability for chat completion
//!
//! Prompt templates and provider wiring are an external collaborator's
//! concern, not this core's. This module defines only the contract every
//! rewriter/evaluator call goes through.

mod error;

pub use error::LlmError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ledger::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

/// Stateless chat completion capability. Every call is independent — the
/// research core never relies on server-side conversation state.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Returns scripted responses in order; errors with `LlmError::Exhausted`
    /// once the script runs out, exercising evaluator/rewriter LLM-failure fallbacks.
    pub struct MockLlmClient {
        responses: Vec<Result<ChatResponse, LlmError>>,
        call_count: AtomicUsize,
        calls: Mutex<Vec<ChatRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<Result<ChatResponse, LlmError>>) -> Self {
            Self { responses, call_count: AtomicUsize::new(0), calls: Mutex::new(Vec::new()) }
        }

        /// Convenience constructor: wraps each string as a successful zero-cost response.
        pub fn with_texts(texts: Vec<&str>) -> Self {
            Self::new(
                texts
                    .into_iter()
                    .map(|t| Ok(ChatResponse { content: t.to_string(), usage: TokenUsage::new(10, 10) }))
                    .collect(),
            )
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.calls.lock().unwrap().push(request);
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses.get(idx).cloned().unwrap_or(Err(LlmError::Exhausted))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLlmClient;
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_scripted_responses_in_order() {
        let client = MockLlmClient::with_texts(vec!["first", "second"]);
        let req = ChatRequest { messages: vec![ChatMessage::user("hi")], temperature: 0.0, max_tokens: 100 };
        let r1 = client.chat(req.clone()).await.unwrap();
        assert_eq!(r1.content, "first");
        let r2 = client.chat(req.clone()).await.unwrap();
        assert_eq!(r2.content, "second");
    }

    #[tokio::test]
    async fn mock_client_errors_when_script_exhausted() {
        let client = MockLlmClient::with_texts(vec!["only"]);
        let req = ChatRequest { messages: vec![ChatMessage::user("hi")], temperature: 0.0, max_tokens: 100 };
        client.chat(req.clone()).await.unwrap();
        let err = client.chat(req).await;
        assert!(err.is_err());
    }
}
