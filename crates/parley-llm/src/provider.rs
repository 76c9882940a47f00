// The reasoning-provider contract and its error types.

use async_trait::async_trait;
use thiserror::Error;

/// Raised while building a provider. The process bootstrap logs it once and
/// runs with a disabled provider instead of exiting.
#[derive(Debug, Error)]
pub enum ConfigurationFault {
    #[error("no Anthropic API key configured")]
    MissingCredentials,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Why a single provider call produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("reasoning provider not configured")]
    NotConfigured,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Transport(String),

    #[error("API returned status {0}")]
    Status(u16),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("provider returned no content")]
    EmptyResponse,
}

/// Submit text, receive text. No structure is guaranteed in the reply.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, InvocationError>;
}
