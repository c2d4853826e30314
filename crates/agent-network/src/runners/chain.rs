//! Sequential relay
//!
//! Agent `i + 1` is only invoked after agent `i`'s outcome is recorded and
//! appended to the transcript. Failed turns leave an error marker so later
//! agents can see where the chain degraded.
//!
//! With a moderator the relay becomes a roundtable: the moderator opens the
//! discussion before the first agent and synthesizes it after the last.

use tracing::{debug, instrument};

use promptlink_common::{
    AgentDescriptor, AgentOutcome, ChatMessage, RelayError, RelayResult, TurnPhase,
};

use super::RunContext;

pub const NO_PRIOR_CONTRIBUTIONS: &str = "(no prior contributions; you are opening the discussion)";

pub const MODERATOR_SYSTEM: &str = "You are a skilled conference moderator. Guide discussions, \
ensure all perspectives are heard, and synthesize key insights.";

/// Rolling record of prior turns, rendered as `[Agent Name]: text`
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<String>,
    max_chars: usize,
}

impl Transcript {
    /// `max_chars == 0` keeps every entry
    pub fn new(max_chars: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_chars,
        }
    }

    pub fn push(&mut self, agent_name: &str, text: &str) {
        self.entries.push(format!("[{}]: {}", agent_name, text));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Render the transcript, eliding the oldest entries past the budget.
    ///
    /// The most recent entry is always kept whole.
    pub fn render(&self) -> String {
        const SEPARATOR: &str = "\n\n";

        if self.max_chars == 0 {
            return self.entries.join(SEPARATOR);
        }

        let mut used = 0;
        let mut kept = 0;
        for entry in self.entries.iter().rev() {
            let cost = entry.chars().count() + if kept > 0 { SEPARATOR.len() } else { 0 };
            if kept > 0 && used + cost > self.max_chars {
                break;
            }
            used += cost;
            kept += 1;
        }

        let start = self.entries.len() - kept;
        let recent = self.entries[start..].join(SEPARATOR);
        if start == 0 {
            recent
        } else {
            format!(
                "[... {} earlier contribution(s) elided ...]{}{}",
                start, SEPARATOR, recent
            )
        }
    }
}

/// Prompt for the next relay turn
pub fn build_turn_prompt(prompt: &str, transcript: &Transcript) -> String {
    let context = if transcript.is_empty() {
        NO_PRIOR_CONTRIBUTIONS.to_string()
    } else {
        transcript.render()
    };

    format!(
        "Build on the evolving conference discussion below.\n\n\
         === Original prompt ===\n{}\n\n\
         === Current context ===\n{}\n\n\
         === Your task ===\n\
         Add the next best contribution (concise but substantive), avoid repetition, \
         and push the discussion forward with concrete insights. \
         Extend the discussion rather than restating earlier points.",
        prompt, context
    )
}

/// Moderator prompt that frames the discussion before anyone speaks
pub fn build_opening_prompt(prompt: &str, agents: &[AgentDescriptor]) -> String {
    let speakers: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
    format!(
        "You are opening a roundtable discussion.\n\n\
         === Topic ===\n{}\n\n\
         === Participants, in speaking order ===\n{}\n\n\
         === Your task ===\n\
         Introduce the topic briefly, set the agenda and a framework for the discussion, \
         and establish ground rules for a productive exchange. \
         Do not answer the topic yourself.",
        prompt,
        speakers.join(", ")
    )
}

/// Moderator prompt that closes the discussion
pub fn build_synthesis_prompt(prompt: &str, transcript: &Transcript) -> String {
    format!(
        "Synthesize the roundtable discussion below into a concise report.\n\n\
         === Topic ===\n{}\n\n\
         === Discussion ===\n{}\n\n\
         === Your task ===\n\
         Cover the executive summary, main themes, consensus points, divergent views, \
         action items and each participant's key contribution.",
        prompt,
        transcript.render()
    )
}

async fn moderator_turn(
    ctx: &RunContext,
    moderator: &AgentDescriptor,
    prompt: String,
    phase: TurnPhase,
) -> AgentOutcome {
    let messages = vec![ChatMessage::system(MODERATOR_SYSTEM), ChatMessage::user(prompt)];
    ctx.session.agent_started(moderator, None);
    let result = ctx.invoker.invoke(&moderator.model, &messages, &ctx.options).await;
    AgentOutcome::from_result(moderator, result).with_phase(phase)
}

fn moderator_label(moderator: &AgentDescriptor) -> String {
    format!("{} (moderator)", moderator.name)
}

#[instrument(
    name = "chain_run",
    skip_all,
    fields(session_id = %ctx.session.id(), agents = agents.len(), moderated = moderator.is_some())
)]
pub async fn run(
    ctx: &RunContext,
    prompt: &str,
    agents: &[AgentDescriptor],
    max_transcript_chars: usize,
    moderator: Option<&AgentDescriptor>,
) -> RelayResult<()> {
    if agents.is_empty() {
        return Err(RelayError::invalid_input("chain run needs at least one agent"));
    }

    let mut transcript = Transcript::new(max_transcript_chars);

    if let Some(moderator) = moderator.filter(|_| !ctx.session.is_stopped()) {
        let opening = build_opening_prompt(prompt, agents);
        let outcome = moderator_turn(ctx, moderator, opening, TurnPhase::Opening).await;
        transcript.push(&moderator_label(moderator), &outcome.text_or_error());
        ctx.session.record(outcome).await?;
    }

    for (turn, agent) in agents.iter().enumerate() {
        if ctx.session.is_stopped() {
            debug!(turn, "Chain stopped before next turn");
            break;
        }

        let messages = ctx.messages_for(&build_turn_prompt(prompt, &transcript));
        ctx.session.agent_started(agent, None);
        let result = ctx.invoker.invoke(&agent.model, &messages, &ctx.options).await;

        let outcome = AgentOutcome::from_result(agent, result);
        transcript.push(&agent.name, &outcome.text_or_error());
        ctx.session.record(outcome).await?;
    }

    if let Some(moderator) = moderator {
        if ctx.session.is_stopped() {
            debug!("Chain stopped, skipping synthesis");
        } else {
            let synthesis = build_synthesis_prompt(prompt, &transcript);
            let outcome = moderator_turn(ctx, moderator, synthesis, TurnPhase::Synthesis).await;
            ctx.session.record(outcome).await?;
        }
    }

    Ok(())
}
