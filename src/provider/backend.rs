//! Language-model backend interface.
//!
//! Backends are external; the coordinator only sees this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options for a single invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: Option<f32>,
    /// Sequences that stop generation
    pub stop_sequences: Vec<String>,
    /// Prepended instructions
    pub system_prompt: Option<String>,
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(1024),
            temperature: Some(0.0),
            stop_sequences: Vec::new(),
            system_prompt: None,
        }
    }
}

/// Backend output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendResponse {
    pub text: String,
    /// Tokens consumed, when the backend reports them
    pub tokens_used: Option<u64>,
}

impl BackendResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: None,
        }
    }
}

/// Errors raised by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend timed out")]
    Timeout,
}

/// A callable language model.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Run `prompt` and return the response text.
    async fn invoke(
        &self,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<BackendResponse, BackendError>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Backend that answers with its prompt; bound to `echo://` profiles.
#[derive(Clone, Debug, Default)]
pub struct EchoBackend;

#[async_trait]
impl LlmBackend for EchoBackend {
    async fn invoke(
        &self,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<BackendResponse, BackendError> {
        let words: Vec<&str> = prompt.split_whitespace().collect();
        let limit = options
            .max_tokens
            .map(|max| max as usize)
            .unwrap_or(words.len());
        let kept = &words[..words.len().min(limit)];
        Ok(BackendResponse {
            text: kept.join(" "),
            tokens_used: Some(kept.len() as u64),
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}
