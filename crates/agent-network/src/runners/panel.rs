//! Fan-out over independent agents

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument};

use promptlink_common::{AgentDescriptor, AgentOutcome, RelayError, RelayResult};

use super::RunContext;

/// Send the same prompt to every agent with bounded concurrency.
///
/// Outcomes are recorded in completion order. Agents not yet dispatched
/// when a stop arrives are skipped.
#[instrument(name = "panel_run", skip_all, fields(session_id = %ctx.session.id(), agents = agents.len()))]
pub async fn run(ctx: &RunContext, prompt: &str, agents: &[AgentDescriptor]) -> RelayResult<()> {
    if agents.is_empty() {
        return Err(RelayError::invalid_input("panel run needs at least one agent"));
    }

    let cap = ctx.cap_for(agents.len());
    let messages = Arc::new(ctx.messages_for(prompt));

    let dispatches = agents.iter().cloned().map(|agent| {
        let session = Arc::clone(&ctx.session);
        let invoker = Arc::clone(&ctx.invoker);
        let options = ctx.options.clone();
        let messages = Arc::clone(&messages);
        async move {
            if session.is_stopped() {
                return None;
            }
            session.agent_started(&agent, None);
            let result = invoker.invoke(&agent.model, &messages, &options).await;
            Some(AgentOutcome::from_result(&agent, result))
        }
    });
    let mut replies = stream::iter(dispatches).buffer_unordered(cap);

    let mut skipped = 0;
    while let Some(outcome) = replies.next().await {
        match outcome {
            Some(outcome) => ctx.session.record(outcome).await?,
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        info!(skipped, "Panel stopped before dispatching every agent");
    }
    Ok(())
}
