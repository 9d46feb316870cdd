use std::env;

use log::info;
use thiserror::Error;

use crate::provider::{CompletionError, CompletionProvider};
use crate::web::models::{ChatRequest, ChatResult, Message};

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Generation parameters applied when a request leaves them unset.
/// Built once at startup and shared through the app state.
#[derive(Debug, Clone)]
pub struct Defaults {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Defaults {
    /// `OPENAI_MODEL` overrides the default model name.
    pub fn from_env() -> Self {
        Self {
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller fault: no message to relay. No provider call is made.
    #[error("No message provided")]
    InvalidRequest,
    /// The provider rejected the call; carries its error text verbatim.
    #[error("{0}")]
    Provider(String),
    /// Transport fault or malformed provider response. The detail is logged
    /// at the boundary but never returned to the caller.
    #[error("An unexpected error occurred")]
    Unexpected(#[source] CompletionError),
}

impl From<CompletionError> for RelayError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Rejected(text) => Self::Provider(text),
            other => Self::Unexpected(other),
        }
    }
}

/// Relays one chat request to the completion provider: appends the user
/// message to the caller's conversation, fetches the assistant reply, and
/// returns both the reply and the updated conversation. On success the output
/// conversation is exactly two entries longer than the input.
pub async fn handle_chat(
    provider: &dyn CompletionProvider,
    defaults: &Defaults,
    request: ChatRequest,
) -> Result<ChatResult, RelayError> {
    if request.message.is_empty() {
        return Err(RelayError::InvalidRequest);
    }

    let model = request.model.as_deref().unwrap_or(&defaults.model);
    let max_tokens = request.max_tokens.unwrap_or(defaults.max_tokens);
    let temperature = request.temperature.unwrap_or(defaults.temperature);

    let mut conversation = request.conversation;
    conversation.push(Message::user(request.message));

    let reply = provider
        .complete(&conversation, model, max_tokens, temperature)
        .await?;

    conversation.push(Message::assistant(reply.clone()));

    info!("Relayed chat request, conversation now {} entries", conversation.len());

    Ok(ChatResult {
        response: reply,
        conversation,
    })
}

#[cfg(test)]
pub mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::web::models::Role;

    /// Deterministic provider stub that records every outbound message list.
    pub struct StubProvider {
        pub reply: Result<String, fn() -> CompletionError>,
        pub calls: Mutex<Vec<Vec<Message>>>,
    }

    impl StubProvider {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(err: fn() -> CompletionError) -> Self {
            Self {
                reply: Err(err),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn complete(
            &self,
            messages: &[Message],
            _model: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(make_err) => Err(make_err()),
            }
        }
    }

    fn request(message: &str, conversation: Vec<Message>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            conversation,
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }

    fn defaults() -> Defaults {
        Defaults {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[tokio::test]
    async fn empty_conversation_yields_two_entries() {
        let stub = StubProvider::replying("hello there");

        let result = handle_chat(&stub, &defaults(), request("hi", vec![]))
            .await
            .unwrap();

        assert_eq!(result.conversation.len(), 2);
        assert_eq!(result.conversation[0], Message::user("hi"));
        assert_eq!(result.conversation[1], Message::assistant("hello there"));
        assert_eq!(result.response, result.conversation[1].content);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_a_provider_call() {
        let stub = StubProvider::replying("unreachable");

        let err = handle_chat(&stub, &defaults(), request("", vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::InvalidRequest));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn conversation_is_threaded_in_order() {
        let stub = StubProvider::replying("goodbye");
        let history = vec![Message::user("hi"), Message::assistant("hello")];

        let result = handle_chat(&stub, &defaults(), request("bye", history))
            .await
            .unwrap();

        // The provider must see the full history plus the trailing user turn
        let calls = stub.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec![
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("bye"),
            ]
        );

        assert_eq!(result.conversation.len(), 4);
        assert_eq!(result.conversation[3], Message::assistant("goodbye"));
    }

    #[tokio::test]
    async fn provider_rejection_carries_provider_text() {
        let stub = StubProvider::failing(|| {
            CompletionError::Rejected("You exceeded your current quota".to_string())
        });

        let err = handle_chat(&stub, &defaults(), request("hi", vec![]))
            .await
            .unwrap_err();

        match err {
            RelayError::Provider(text) => {
                assert_eq!(text, "You exceeded your current quota");
            }
            other => panic!("expected Provider, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_provider_response_is_unexpected() {
        let stub = StubProvider::failing(|| {
            CompletionError::MalformedResponse("no choices".to_string())
        });

        let err = handle_chat(&stub, &defaults(), request("hi", vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Unexpected(_)));
        assert_eq!(err.to_string(), "An unexpected error occurred");
    }

    #[tokio::test]
    async fn repeated_calls_produce_the_same_conversation_shape() {
        let stub = StubProvider::replying("OK");

        let first = handle_chat(&stub, &defaults(), request("hi", vec![]))
            .await
            .unwrap();
        let second = handle_chat(&stub, &defaults(), request("hi", vec![]))
            .await
            .unwrap();

        assert_eq!(first.conversation.len(), second.conversation.len());
        for (a, b) in first.conversation.iter().zip(&second.conversation) {
            assert_eq!(a.role, b.role);
        }
        assert_eq!(first.conversation[0].role, Role::User);
        assert_eq!(first.conversation[1].role, Role::Assistant);
    }
}
