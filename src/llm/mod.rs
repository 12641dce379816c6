//! Chat-completion boundary: role-tagged messages in, generated text out.
//!
//! The LLM is used **only** for:
//! - Drafting a SPARQL query from a question
//! - Repairing a query from an execution diagnostic
//! - Synthesizing a natural-language answer from query results
//!
//! All three call through the [`CompletionClient`] trait, so the backend can
//! be swapped (hosted API, local server, scripted fake in tests) without
//! touching the pipeline. Query work runs with deterministic decoding;
//! answers get a looser prose profile.

pub mod http;

use miette::Diagnostic;
use thiserror::Error;

pub use http::{HttpCompletionClient, LlmConfig};

/// Errors from the completion backend.
///
/// These are never retried by the repair loop: a failing backend would fail
/// the retry too, so the error propagates to the caller immediately.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("completion request failed: {message}")]
    #[diagnostic(
        code(ankh::llm::request_failed),
        help("Check that the completion endpoint is reachable and [llm] base_url is correct.")
    )]
    RequestFailed { message: String },

    #[error("completion endpoint returned status {status}: {body}")]
    #[diagnostic(
        code(ankh::llm::status),
        help("Check the model name, the API key, and the endpoint's request limits.")
    )]
    Status { status: u16, body: String },

    #[error("failed to parse completion response: {message}")]
    #[diagnostic(
        code(ankh::llm::parse_error),
        help("The endpoint returned an unexpected response format; it must speak the OpenAI chat-completions wire format.")
    )]
    ParseError { message: String },

    #[error("API key environment variable {env} is not set")]
    #[diagnostic(
        code(ankh::llm::missing_api_key),
        help("Export the key (`export {env}=...`) or remove [llm] api_key_env for keyless endpoints.")
    )]
    MissingApiKey { env: String },
}

/// Message role in a chat exchange.
///
/// The pipeline only ever speaks as the system (instructions) or the user
/// (the question and its artifacts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// An opaque model identifier passed through to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef(String);

impl ModelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Sampling parameters for a completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoding {
    pub temperature: f32,
    pub top_p: f32,
}

impl Decoding {
    /// Near-greedy decoding for query synthesis and repair, where variance
    /// only costs retry budget.
    pub const DETERMINISTIC: Decoding = Decoding {
        temperature: 0.1,
        top_p: 0.1,
    };

    /// Moderate sampling for answer prose.
    pub const PROSE: Decoding = Decoding {
        temperature: 0.7,
        top_p: 0.9,
    };
}

/// The completion boundary the pipeline depends on.
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        messages: &[ChatMessage],
        model: &ModelRef,
        decoding: Decoding,
    ) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_to_wire_names() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::User.as_str(), "user");
    }

    #[test]
    fn message_constructors_tag_roles() {
        let m = ChatMessage::system("be terse");
        assert_eq!(m.role, ChatRole::System);
        let m = ChatMessage::user("Who directed [Le Havre]?");
        assert_eq!(m.role, ChatRole::User);
    }

    #[test]
    fn deterministic_profile_is_near_greedy() {
        assert!(Decoding::DETERMINISTIC.temperature <= 0.2);
        assert!(Decoding::DETERMINISTIC.top_p <= 0.2);
        assert!(Decoding::PROSE.temperature > Decoding::DETERMINISTIC.temperature);
    }

    #[test]
    fn model_ref_displays_name() {
        assert_eq!(ModelRef::from("deepseek-chat").to_string(), "deepseek-chat");
    }
}
