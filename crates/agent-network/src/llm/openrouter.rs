//! OpenAI-compatible chat completions client (OpenRouter by default)

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use promptlink_common::text::truncate_chars;
use promptlink_common::{ChatMessage, InvokeError, ProviderConfig};

use super::{InvocationOptions, ModelInvoker};

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct OpenRouterClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    referer: Option<String>,
    title: Option<String>,
}

impl OpenRouterClient {
    /// Build a client, reading the API key from the configured environment variable
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::with_api_key(config, config.api_key_from_env())
    }

    pub fn with_api_key(config: &ProviderConfig, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            referer: config.referer.clone(),
            title: config.title.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap, InvokeError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| InvokeError::Configuration("API key contains invalid characters".to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(referer) = self.referer.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert("HTTP-Referer", referer);
        }
        if let Some(title) = self.title.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert("X-Title", title);
        }
        Ok(headers)
    }
}

#[async_trait]
impl ModelInvoker for OpenRouterClient {
    #[instrument(name = "invoke_model", skip(self, messages, options), fields(messages = messages.len()))]
    async fn invoke(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &InvocationOptions,
    ) -> Result<String, InvokeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| InvokeError::Configuration("missing provider API key".to_string()))?;

        let body = CompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers(api_key)?)
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvokeError::unavailable(model, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InvokeError::unavailable(model, e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream returned non-success status");
            return Err(InvokeError::UpstreamError {
                model: model.to_string(),
                status: status.as_u16(),
                body: truncate_chars(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| InvokeError::malformed(model, format!("invalid JSON: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| InvokeError::malformed(model, "missing choices[0].message.content"))?;

        debug!(chars = content.len(), "Model invocation succeeded");
        Ok(content)
    }
}
