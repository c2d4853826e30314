//! Final synthesis pass over a session's outcomes

use std::sync::Arc;
use tracing::{info, instrument};

use promptlink_common::text::truncate_chars;
use promptlink_common::{AgentOutcome, ChatMessage, RelayError, RelayResult};

use crate::llm::{InvocationOptions, ModelInvoker};

pub const AGGREGATOR_SYSTEM: &str = "Concise, structured, no fluff.";
const AGGREGATOR_TEMPERATURE: f32 = 0.2;
const AGGREGATOR_MAX_TOKENS: u32 = 1600;

pub struct Aggregator {
    invoker: Arc<dyn ModelInvoker>,
    model: String,
    snippet_chars: usize,
    options: InvocationOptions,
}

impl Aggregator {
    /// `options` supplies the timeout; sampling is fixed for summaries
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        model: impl Into<String>,
        snippet_chars: usize,
        options: &InvocationOptions,
    ) -> Self {
        Self {
            invoker,
            model: model.into(),
            snippet_chars,
            options: options
                .clone()
                .with_temperature(AGGREGATOR_TEMPERATURE)
                .with_max_tokens(AGGREGATOR_MAX_TOKENS),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Distill outcomes into one report.
    ///
    /// Fails with `NoResults` when no outcome succeeded, without calling the model.
    #[instrument(name = "aggregate", skip_all, fields(model = %self.model, outcomes = outcomes.len()))]
    pub async fn summarize(
        &self,
        title: &str,
        prompt: &str,
        outcomes: &[AgentOutcome],
    ) -> RelayResult<String> {
        if !outcomes.iter().any(AgentOutcome::is_success) {
            return Err(RelayError::NoResults(
                "no successful agent output to aggregate".to_string(),
            ));
        }

        let messages = vec![
            ChatMessage::system(AGGREGATOR_SYSTEM),
            ChatMessage::user(build_prompt(title, prompt, outcomes, self.snippet_chars)),
        ];
        let report = self.invoker.invoke(&self.model, &messages, &self.options).await?;
        info!(chars = report.len(), "Aggregation completed");
        Ok(report)
    }
}

/// One bullet per outcome, each truncated to `snippet_chars`
pub fn build_prompt(
    title: &str,
    prompt: &str,
    outcomes: &[AgentOutcome],
    snippet_chars: usize,
) -> String {
    let bullets: Vec<String> = outcomes
        .iter()
        .map(|outcome| match (&outcome.response, &outcome.error) {
            (Some(text), _) => format!(
                "- [{}] {}",
                outcome.agent_name,
                truncate_chars(text, snippet_chars)
            ),
            (None, error) => format!(
                "- [{}] (no output: {})",
                outcome.agent_name,
                error.as_deref().unwrap_or("unknown error")
            ),
        })
        .collect();

    format!(
        "You are a senior editor. Title: {}\n\
         Original prompt:\n{}\n\n\
         Below are outputs from multiple agents. Remove redundancy, resolve conflicts, \
         and produce a concise, well-structured report with sections, bullet points, \
         and a short executive summary:\n\n{}",
        title,
        prompt,
        bullets.join("\n")
    )
}
