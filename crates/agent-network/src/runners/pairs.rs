//! Two-agent debates
//!
//! Each pair keeps its own message list. Per round, A answers, then B
//! responds to A, and every reply is followed by a short user instruction
//! steering the next turn.

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument};

use promptlink_common::{AgentDescriptor, AgentOutcome, ChatMessage, RelayError, RelayResult};

use super::RunContext;

pub const RESPOND_INSTRUCTION: &str = "Respond to the above, challenge assumptions briefly.";
pub const REBUTTAL_INSTRUCTION: &str = "Short rebuttal to the last point.";

#[instrument(name = "pairs_run", skip_all, fields(session_id = %ctx.session.id(), pairs = pairs.len(), rounds = rounds))]
pub async fn run(
    ctx: &RunContext,
    prompt: &str,
    pairs: &[(AgentDescriptor, AgentDescriptor)],
    rounds: u32,
) -> RelayResult<()> {
    if pairs.is_empty() {
        return Err(RelayError::invalid_input("pairs run needs at least one pair"));
    }
    if rounds == 0 {
        return Err(RelayError::invalid_input("rounds must be at least 1"));
    }

    let cap = ctx.cap_for(pairs.len());
    let debates = pairs
        .iter()
        .cloned()
        .map(|(a, b)| debate(ctx.clone(), prompt.to_string(), a, b, rounds));
    let outcomes: Vec<RelayResult<()>> = stream::iter(debates)
        .buffer_unordered(cap)
        .collect()
        .await;

    outcomes.into_iter().collect()
}

async fn debate(
    ctx: RunContext,
    prompt: String,
    a: AgentDescriptor,
    b: AgentDescriptor,
    rounds: u32,
) -> RelayResult<()> {
    let mut messages = ctx.messages_for(&prompt);

    for round in 1..=rounds {
        for (agent, follow_up) in [(&a, RESPOND_INSTRUCTION), (&b, REBUTTAL_INSTRUCTION)] {
            if ctx.session.is_stopped() {
                debug!(a = %a.id, b = %b.id, round, "Pair stopped");
                return Ok(());
            }

            ctx.session.agent_started(agent, Some(round));
            let result = ctx.invoker.invoke(&agent.model, &messages, &ctx.options).await;

            match &result {
                Ok(text) => messages.push(ChatMessage::assistant(text.clone())),
                Err(e) => messages.push(ChatMessage::user(format!("[Agent could not respond: {}]", e))),
            }
            messages.push(ChatMessage::user(follow_up));

            ctx.session
                .record(AgentOutcome::from_result(agent, result).with_round(round))
                .await?;
        }
    }
    Ok(())
}
