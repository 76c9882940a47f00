// Claude API client using reqwest-eventsource.
//
// Sends the synthesized prompt to the Anthropic Messages API with
// `stream: true`, concatenates the streamed text deltas and returns the
// full completion, with its token usage, once `message_stop` arrives.

use async_trait::async_trait;
use futures_util::StreamExt;
use parley_core::config::{Config, LlmSettings};
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::provider::{ConfigurationFault, InvocationError, ReasoningProvider};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Token counts reported by the API for one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The concatenated reply text and what it cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

// ---------------------------------------------------------------------------
// ClaudeClient
// ---------------------------------------------------------------------------

/// Low-level Claude API client.
pub struct ClaudeClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_url: String,
    system: Option<String>,
}

impl ClaudeClient {
    /// Create a client for `api_key` using the model, token budget, timeout
    /// and endpoint from `settings`.
    pub fn new(api_key: String, settings: &LlmSettings) -> Result<Self, ConfigurationFault> {
        if api_key.trim().is_empty() {
            return Err(ConfigurationFault::MissingCredentials);
        }
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConfigurationFault::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_url: settings
                .api_url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_API_URL.to_string()),
            system: None,
        })
    }

    /// Build a client from the application config, or report why one
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationFault> {
        let key = config
            .credentials
            .anthropic_api_key
            .clone()
            .ok_or(ConfigurationFault::MissingCredentials)?;
        Self::new(key, &config.llm)
    }

    /// Attach a system prompt sent with every request.
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    fn request_body(&self, user_content: &str) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "stream": true,
            "messages": [{ "role": "user", "content": user_content }]
        });
        if let Some(system) = &self.system {
            body["system"] = Value::String(system.clone());
        }
        body
    }

    /// Send `user_content` and collect the streamed reply.
    pub async fn stream_message(&self, user_content: &str) -> Result<Completion, InvocationError> {
        let request = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.request_body(user_content));

        let mut es = request
            .eventsource()
            .map_err(|e| InvocationError::Stream(format!("failed to create event source: {e}")))?;

        let result = collect_stream(&mut es).await;
        es.close();
        result
    }
}

/// Drain `es` until the message completes or fails.
async fn collect_stream(es: &mut EventSource) -> Result<Completion, InvocationError> {
    let mut full_text = String::new();
    let mut usage = Usage::default();

    while let Some(event) = es.next().await {
        match event {
            Ok(Event::Open) => {
                debug!("SSE connection opened");
            }
            Ok(Event::Message(msg)) => {
                let data = &msg.data;
                match msg.event.as_str() {
                    "message_start" => {
                        match parse_input_tokens(data) {
                            Some(n) => usage.input_tokens = n,
                            None => warn!("failed to parse input_tokens from message_start"),
                        }
                        debug!(input_tokens = usage.input_tokens, "message_start");
                    }
                    "content_block_delta" => {
                        if let Some(text) = parse_delta_text(data) {
                            full_text.push_str(&text);
                        }
                    }
                    "message_delta" => {
                        match parse_output_tokens(data) {
                            Some(n) => usage.output_tokens = n,
                            None => warn!("failed to parse output_tokens from message_delta"),
                        }
                        debug!(output_tokens = usage.output_tokens, "message_delta");
                    }
                    "message_stop" => {
                        return non_empty(full_text, usage);
                    }
                    "error" => {
                        let message = parse_error_message(data)
                            .unwrap_or_else(|| "provider reported an error".to_string());
                        warn!(%message, "SSE error event");
                        return Err(InvocationError::Stream(message));
                    }
                    event_type => {
                        debug!(event_type, "ignoring SSE event");
                    }
                }
            }
            Err(reqwest_eventsource::Error::StreamEnded) => {
                debug!("stream ended without message_stop");
                return non_empty(full_text, usage);
            }
            Err(err) => {
                warn!(?err, "SSE stream error");
                return Err(classify_error(err));
            }
        }
    }

    non_empty(full_text, usage)
}

fn non_empty(text: String, usage: Usage) -> Result<Completion, InvocationError> {
    if text.trim().is_empty() {
        Err(InvocationError::EmptyResponse)
    } else {
        Ok(Completion { text, usage })
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either an active Claude client or a disabled stand-in.
pub enum LlmClient {
    Active(ClaudeClient),
    /// Every call fails with `InvocationError::NotConfigured`.
    Disabled,
}

#[async_trait]
impl ReasoningProvider for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, InvocationError> {
        match self {
            LlmClient::Active(client) => {
                let completion = client.stream_message(prompt).await?;
                info!(
                    model = %client.model,
                    input_tokens = completion.usage.input_tokens,
                    output_tokens = completion.usage.output_tokens,
                    chars = completion.text.chars().count(),
                    "completion received"
                );
                Ok(completion.text)
            }
            LlmClient::Disabled => Err(InvocationError::NotConfigured),
        }
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `input_tokens` from a `message_start` event's JSON.
///
/// Expected shape: `{ "type": "message_start", "message": { "usage": { "input_tokens": N } } }`
pub(crate) fn parse_input_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("message")?
        .get("usage")?
        .get("input_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `delta.text` from a `content_block_delta` event's JSON.
///
/// Expected shape: `{ "type": "content_block_delta", "delta": { "type": "text_delta", "text": "..." } }`
pub(crate) fn parse_delta_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `output_tokens` from a `message_delta` event's JSON.
pub(crate) fn parse_output_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("usage")?
        .get("output_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `error.message` from an `error` event's JSON.
///
/// Expected shape: `{ "type": "error", "error": { "type": "overloaded_error", "message": "..." } }`
pub(crate) fn parse_error_message(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

fn classify_error(err: reqwest_eventsource::Error) -> InvocationError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            InvocationError::Status(status.as_u16())
        }
        reqwest_eventsource::Error::Transport(e) if e.is_timeout() => InvocationError::Timeout,
        reqwest_eventsource::Error::Transport(e) => InvocationError::Transport(e.to_string()),
        other => InvocationError::Stream(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
