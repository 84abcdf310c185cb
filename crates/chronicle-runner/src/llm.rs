//! HTTP backends for narrative generation.
//!
//! Enum dispatch over two wire formats: OpenAI-compatible chat
//! completions and the Anthropic Messages API (async methods are not
//! dyn-compatible, so no trait objects). Requests and responses are
//! typed with serde rather than navigated as raw JSON trees; both
//! backends return the model's text verbatim, and `parse` turns it into
//! drafts.

use serde::{Deserialize, Serialize};

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;
use crate::prompt::RenderedPrompt;

/// Token ceiling for a single completion. Anchor batches are the largest
/// response (three full drafts) and fit comfortably under this.
const MAX_COMPLETION_TOKENS: u32 = 1024;

/// Sampling temperature. Narrative prose wants some variance; the JSON
/// envelope survives it fine.
const TEMPERATURE: f32 = 0.8;

/// A backend that turns a rendered prompt into narrative text.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt to the model and return the response text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::LlmBackend`] if the HTTP call fails, the
    /// API reports an error status, or the response carries no text.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt).await,
            Self::Anthropic(backend) => backend.complete(prompt).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// One chat message; both wire formats use the same shape.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Read the body of a failed response for the error message.
async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned())
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints. Posts to
/// `{api_url}/chat/completions` and asks for a JSON object response so
/// beat drafts come back without prose wrappers.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                RunnerError::LlmBackend(format!("chat completions request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::LlmBackend(format!(
                "chat completions returned {status}: {}",
                error_body(response).await
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            RunnerError::LlmBackend(format!("chat completions response malformed: {e}"))
        })?;
        first_choice(parsed)
    }
}

/// Pull the text out of the first completion choice.
fn first_choice(response: ChatResponse) -> Result<String, RunnerError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| {
            RunnerError::LlmBackend("chat completions response had no choices".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// One content block. Non-text blocks deserialize with an empty `text`
/// and are skipped when extracting the completion.
#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Backend for the Anthropic Messages API.
///
/// Differs from the chat completions format: the API key travels in an
/// `x-api-key` header, the system prompt is a top-level field rather
/// than a message, and the text comes back as content blocks.
pub struct AnthropicBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, RunnerError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: TEMPERATURE,
            system: &prompt.system,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.config.api_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("messages request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RunnerError::LlmBackend(format!(
                "messages API returned {status}: {}",
                error_body(response).await
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            RunnerError::LlmBackend(format!("messages response malformed: {e}"))
        })?;
        first_text_block(parsed)
    }
}

/// Pull the first non-empty text block out of a messages response.
fn first_text_block(response: MessagesResponse) -> Result<String, RunnerError> {
    response
        .content
        .into_iter()
        .find(|block| !block.text.is_empty())
        .map(|block| block.text)
        .ok_or_else(|| {
            RunnerError::LlmBackend("messages response had no text block".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_first_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "{\"name\": \"The Long Siege\"}"}}]}"#,
        )
        .unwrap();
        let text = first_choice(parsed);
        assert!(text.is_ok());
        assert!(text.unwrap_or_default().contains("Siege"));
    }

    #[test]
    fn chat_response_without_choices_is_an_error() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice(parsed).is_err());
    }

    #[test]
    fn messages_response_skips_non_text_blocks() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "tool_use", "id": "x"}, {"type": "text", "text": "{\"summary\": \"It ended.\"}"}]}"#,
        )
        .unwrap();
        let text = first_text_block(parsed);
        assert_eq!(text.ok().as_deref(), Some("{\"summary\": \"It ended.\"}"));
    }

    #[test]
    fn empty_messages_response_is_an_error() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(first_text_block(parsed).is_err());
    }

    #[test]
    fn chat_request_wire_shape() {
        let request = ChatRequest {
            model: "test-model",
            messages: vec![ChatMessage {
                role: "user",
                content: "write the next beat",
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_COMPLETION_TOKENS,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json.get("response_format").and_then(|f| f.get("type")),
            Some(&serde_json::Value::String("json_object".to_owned()))
        );
        assert_eq!(
            json.get("messages").and_then(|m| m.get(0)).and_then(|m| m.get("role")),
            Some(&serde_json::Value::String("user".to_owned()))
        );
    }

    #[test]
    fn create_backend_dispatches_correctly() {
        let openai_config = LlmBackendConfig {
            backend_type: BackendType::OpenAi,
            api_url: "https://api.openai.com/v1".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
        };
        assert_eq!(create_backend(&openai_config).name(), "openai-compatible");

        let anthropic_config = LlmBackendConfig {
            backend_type: BackendType::Anthropic,
            api_url: "https://api.anthropic.com/v1".to_owned(),
            api_key: "test".to_owned(),
            model: "test-model".to_owned(),
        };
        assert_eq!(create_backend(&anthropic_config).name(), "anthropic");
    }
}
