//! Run strategies
//!
//! - [`panel`]: every agent answers the same prompt concurrently
//! - [`pairs`]: concurrent two-agent debates over a number of rounds
//! - [`chain`]: sequential relay over a shared transcript, optionally
//!   opened and closed by a moderator
//!
//! Runners never fail because an agent failed. Per-agent errors are
//! recorded as outcomes; only bookkeeping errors propagate.

pub mod chain;
pub mod pairs;
pub mod panel;

use std::sync::Arc;

use promptlink_common::{AgentDescriptor, ChatMessage, RelayResult, Strategy};

use crate::llm::{InvocationOptions, ModelInvoker};
use crate::session::SessionHandle;

pub use chain::{build_opening_prompt, build_synthesis_prompt, build_turn_prompt, Transcript};

/// Everything a runner needs to drive one session
#[derive(Clone)]
pub struct RunContext {
    pub session: Arc<SessionHandle>,
    pub invoker: Arc<dyn ModelInvoker>,
    pub options: InvocationOptions,
    pub system: Option<String>,
    /// Cap on concurrently outstanding units, at least 1
    pub concurrency: usize,
}

impl RunContext {
    /// System message (if any) followed by a user message
    pub(crate) fn messages_for(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Concurrency cap for `units` independent units
    pub(crate) fn cap_for(&self, units: usize) -> usize {
        self.concurrency.min(units).max(1)
    }
}

/// Resolved agents and parameters for one run
#[derive(Debug, Clone, PartialEq)]
pub enum RunPlan {
    Panel {
        agents: Vec<AgentDescriptor>,
    },
    Pairs {
        pairs: Vec<(AgentDescriptor, AgentDescriptor)>,
        rounds: u32,
    },
    Chain {
        agents: Vec<AgentDescriptor>,
        /// 0 keeps the whole transcript
        max_transcript_chars: usize,
        /// Opens the discussion before the first agent and synthesizes it after the last
        moderator: Option<AgentDescriptor>,
    },
}

impl RunPlan {
    pub fn strategy(&self) -> Strategy {
        match self {
            RunPlan::Panel { .. } => Strategy::Panel,
            RunPlan::Pairs { .. } => Strategy::Pairs,
            RunPlan::Chain { .. } => Strategy::Chain,
        }
    }

    /// Number of invocations a run without a stop performs
    pub fn total_units(&self) -> usize {
        match self {
            RunPlan::Panel { agents } => agents.len(),
            RunPlan::Pairs { pairs, rounds } => pairs.len() * (*rounds as usize) * 2,
            RunPlan::Chain {
                agents, moderator, ..
            } => agents.len() + if moderator.is_some() { 2 } else { 0 },
        }
    }

    pub async fn execute(&self, ctx: &RunContext, prompt: &str) -> RelayResult<()> {
        match self {
            RunPlan::Panel { agents } => panel::run(ctx, prompt, agents).await,
            RunPlan::Pairs { pairs, rounds } => pairs::run(ctx, prompt, pairs, *rounds).await,
            RunPlan::Chain {
                agents,
                max_transcript_chars,
                moderator,
            } => chain::run(ctx, prompt, agents, *max_transcript_chars, moderator.as_ref()).await,
        }
    }
}
