//! Real-time status streaming via channels

use tokio::sync::broadcast;

use promptlink_common::{AgentDescriptor, AgentOutcome, EventSource, EventType, SessionId, StatusEvent};

const CHANNEL_CAPACITY: usize = 1000;

/// Per-session broadcast of [`StatusEvent`]s
#[derive(Debug)]
pub struct StatusStream {
    session_id: SessionId,
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusStream {
    pub fn new(session_id: SessionId) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { session_id, sender }
    }

    /// Emit status event
    pub fn emit(&self, source: EventSource, event: EventType) {
        // No receivers is fine
        let _ = self.sender.send(StatusEvent::new(&self.session_id, source, event));
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn emit_orchestrator(&self, event: EventType) {
        self.emit(EventSource::Orchestrator, event);
    }

    /// Helper to emit agent started event
    pub fn emit_agent_started(&self, agent: &AgentDescriptor, round: Option<u32>) {
        self.emit(agent_source(agent), EventType::AgentStarted { round });
    }

    /// Helper to emit the completed or failed event for a recorded outcome
    pub fn emit_outcome(&self, outcome: &AgentOutcome) {
        let source = EventSource::Agent {
            agent_id: outcome.agent_id.clone(),
            agent_name: outcome.agent_name.clone(),
        };
        let event = match (&outcome.response, &outcome.error) {
            (Some(text), _) => EventType::AgentCompleted {
                round: outcome.round,
                chars: text.chars().count(),
            },
            (None, error) => EventType::AgentFailed {
                round: outcome.round,
                error: error.clone().unwrap_or_default(),
            },
        };
        self.emit(source, event);
    }
}

fn agent_source(agent: &AgentDescriptor) -> EventSource {
    EventSource::Agent {
        agent_id: agent.id.clone(),
        agent_name: agent.name.clone(),
    }
}
