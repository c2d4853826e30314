//! Model invocation layer
//!
//! Every provider is reduced to one capability: produce text from a message
//! sequence, or fail with an [`InvokeError`]. Runners only ever see this
//! trait, so provider response shapes never leak past this module.

pub mod openrouter;

use async_trait::async_trait;
use std::time::Duration;

use promptlink_common::{ChatMessage, InvokeError, ProviderConfig};

pub use openrouter::OpenRouterClient;

/// Sampling and transport options for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
    pub timeout: Duration,
}

impl InvocationOptions {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: None,
            timeout: config.timeout(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

impl Default for InvocationOptions {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

/// Sends one conversation to one remote model.
///
/// Implementations perform exactly one outbound call per invocation and do
/// not retry.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &InvocationOptions,
    ) -> Result<String, InvokeError>;

    /// Invoke with a single user prompt and an optional system instruction
    async fn invoke_prompt(
        &self,
        model: &str,
        system: Option<&str>,
        prompt: &str,
        options: &InvocationOptions,
    ) -> Result<String, InvokeError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.invoke(model, &messages, options).await
    }
}
