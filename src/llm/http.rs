//! OpenAI-compatible HTTP completion client.
//!
//! Targets any endpoint speaking the OpenAI chat-completions wire format:
//! DeepSeek, Ollama's `/v1` facade, vLLM, and the hosted APIs. The default
//! configuration points at a local keyless Ollama; hosted endpoints name an
//! environment variable for the key, which is read once at construction and
//! never written to disk.

use serde_json::Value;
use tracing::debug;

use super::{ChatMessage, CompletionClient, Decoding, LlmError, ModelRef};

/// Connection settings for the completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended. Include `/v1` when the
    /// endpoint wants it (e.g. `http://localhost:11434/v1`).
    pub base_url: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    pub api_key_env: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            api_key_env: None,
            timeout_secs: 120,
        }
    }
}

/// HTTP client for the chat-completions wire format.
pub struct HttpCompletionClient {
    config: LlmConfig,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// Create a client, resolving the API key from the environment.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = match &config.api_key_env {
            Some(env) => Some(
                std::env::var(env).map_err(|_| LlmError::MissingApiKey { env: env.clone() })?,
            ),
            None => None,
        };
        Ok(Self { config, api_key })
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
        model: &ModelRef,
        decoding: Decoding,
    ) -> Result<String, LlmError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let msgs: Vec<Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let body = serde_json::json!({
            "model": model.as_str(),
            "messages": msgs,
            "temperature": decoding.temperature,
            "top_p": decoding.top_p,
            "stream": false,
        });

        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let mut request = agent
            .post(&self.chat_url())
            .set("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.set("Authorization", &format!("Bearer {key}"));
        }

        debug!(model = %model, messages = messages.len(), "requesting completion");
        let resp = match request.send_string(&body_str) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(LlmError::Status {
                    status,
                    body: body.trim().to_string(),
                });
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(LlmError::RequestFailed {
                    message: t.to_string(),
                });
            }
        };

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        let json: Value = serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing choices[0].message.content".into(),
            })
    }
}

impl std::fmt::Debug for HttpCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
