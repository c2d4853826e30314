use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Unique identifier for orchestration sessions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run dispatches its agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// Every agent answers the same prompt independently and concurrently
    #[default]
    Panel,
    /// Concurrent two-agent debates running a fixed number of rounds
    Pairs,
    /// Sequential relay where each agent extends the shared transcript
    Chain,
}

impl Strategy {
    /// Title handed to the aggregator and used in rendered reports
    pub fn report_title(&self) -> &'static str {
        match self {
            Strategy::Panel => "Expert Panel Report",
            Strategy::Pairs => "Pairs Debate Report",
            Strategy::Chain => "Conference Chain Report",
        }
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Queued,
    Running,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

/// Output format for rendered session reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Html,
    Markdown,
}

/// A named remote model endpoint the system can invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    /// Provider-side model reference, e.g. `deepseek/deepseek-r1`
    pub model: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Pairing metadata used by compatibility scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<AgentProfile>,
}

/// Temperament and skills of an agent, as seen by pair scoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AgentProfile {
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Agent ids this agent is known to work well with
    #[serde(default)]
    pub best_pairs: Vec<String>,
}

impl AgentProfile {
    pub fn new(personality: impl Into<String>) -> Self {
        Self {
            personality: Some(personality.into()),
            ..Default::default()
        }
    }

    pub fn with_strengths<I, S>(mut self, strengths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strengths = strengths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_best_pairs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.best_pairs = ids.into_iter().map(Into::into).collect();
        self
    }
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: model.into(),
            active: true,
            group: None,
            notes: None,
            profile: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Special turns of a moderated chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    Opening,
    Synthesis,
}

/// One agent's contribution to a session.
///
/// Exactly one of `response` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AgentOutcome {
    pub agent_id: String,
    pub agent_name: String,
    pub model: String,
    pub response: Option<String>,
    pub error: Option<String>,
    /// 1-based debate round, only set for pairs runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// Set for the moderator's opening and synthesis turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<TurnPhase>,
    /// The reply arrived after a stop was requested
    #[serde(default)]
    pub cancelled: bool,
}

impl AgentOutcome {
    pub fn success(agent: &AgentDescriptor, response: impl Into<String>) -> Self {
        Self {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            model: agent.model.clone(),
            response: Some(response.into()),
            error: None,
            round: None,
            phase: None,
            cancelled: false,
        }
    }

    pub fn failure(agent: &AgentDescriptor, error: impl Into<String>) -> Self {
        Self {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            model: agent.model.clone(),
            response: None,
            error: Some(error.into()),
            round: None,
            phase: None,
            cancelled: false,
        }
    }

    /// Build an outcome from an invocation result of any displayable error type
    pub fn from_result<E: fmt::Display>(agent: &AgentDescriptor, result: Result<String, E>) -> Self {
        match result {
            Ok(text) => Self::success(agent, text),
            Err(e) => Self::failure(agent, e.to_string()),
        }
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn with_phase(mut self, phase: TurnPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn mark_cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }

    pub fn is_success(&self) -> bool {
        self.response.is_some()
    }

    /// Reply text or the error marker, for transcripts and reports
    pub fn text_or_error(&self) -> String {
        match (&self.response, &self.error) {
            (Some(text), _) => text.clone(),
            (None, Some(err)) => format!("[error: {}]", err),
            (None, None) => "[no output]".to_string(),
        }
    }
}

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message in a model conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Caller-supplied run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunRequest {
    pub prompt: String,
    #[serde(default)]
    pub strategy: Strategy,
    /// Agent ids for panel and chain runs; the registry's active set when omitted
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    /// Agent id pairs for pairs runs
    #[serde(default)]
    pub pairs: Option<Vec<Vec<String>>>,
    /// Debate rounds for pairs runs
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Cap on concurrent outbound calls
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// System instruction sent with every invocation
    #[serde(default)]
    pub system: Option<String>,
    /// Run the aggregator after the runner completes
    #[serde(default)]
    pub aggregate: Option<bool>,
    #[serde(default)]
    pub aggregator_model: Option<String>,
    /// Agent id that opens and closes a chain run
    #[serde(default)]
    pub moderator: Option<String>,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            prompt: prompt.into(),
            strategy,
            ..Default::default()
        }
    }

    pub fn with_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents = Some(agents.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.pairs.get_or_insert_with(Vec::new).push(vec![a.into(), b.into()]);
        self
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_moderator(mut self, agent_id: impl Into<String>) -> Self {
        self.moderator = Some(agent_id.into());
        self
    }

    pub fn with_aggregation(mut self, model: Option<String>) -> Self {
        self.aggregate = Some(true);
        self.aggregator_model = model;
        self
    }
}

/// Polling view of a session's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StatusView {
    pub session_id: String,
    pub strategy: Strategy,
    pub status: SessionStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stop_requested: bool,
}

/// Results view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ResultsView {
    pub session_id: String,
    pub strategy: Strategy,
    pub status: SessionStatus,
    pub results: Vec<AgentOutcome>,
    pub error: Option<String>,
    /// Aggregated report, once the aggregation pass succeeded
    pub report: Option<String>,
    /// Failure of the aggregation pass; the raw results remain valid
    pub aggregation_error: Option<String>,
}

/// Listing entry for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionSummary {
    pub session_id: String,
    pub strategy: Strategy,
    pub status: SessionStatus,
    pub progress: u8,
    pub result_count: usize,
    pub prompt_preview: String,
    pub created_at: DateTime<Utc>,
}

/// Reply of a single synchronous agent call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ChatReply {
    pub agent_id: String,
    pub agent_name: String,
    pub model: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

/// Qualitative band of a compatibility score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CompatibilityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CompatibilityLevel {
    /// 80 and up is excellent, 60 good, 40 fair
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::Excellent
        } else if score >= 60 {
            Self::Good
        } else if score >= 40 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// How well two agents are expected to work as a debate pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CompatibilityReport {
    pub agent_a: String,
    pub agent_b: String,
    /// 0..=100
    pub score: u8,
    pub level: CompatibilityLevel,
    /// Human-readable reasons behind the score
    pub factors: Vec<String>,
    pub recommended: bool,
}

/// Model-written pairing advice for a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PairSuggestion {
    pub task_type: String,
    pub model: String,
    pub analysis: String,
    pub timestamp: DateTime<Utc>,
}

/// Real-time status event for WebSocket streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StatusEvent {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub event: EventType,
}

impl StatusEvent {
    pub fn new(session_id: &SessionId, source: EventSource, event: EventType) -> Self {
        Self {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            source,
            event,
        }
    }

    /// Whether this is the last lifecycle event a session emits
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event,
            EventType::RunCompleted { .. } | EventType::RunFailed { .. }
        )
    }
}

/// Source of a status event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSource {
    Orchestrator,
    Agent { agent_id: String, agent_name: String },
    Aggregator { model: String },
}

/// Types of events that can occur during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventType {
    RunStarted { strategy: Strategy, total_units: usize },
    AgentStarted { round: Option<u32> },
    AgentCompleted { round: Option<u32>, chars: usize },
    AgentFailed { round: Option<u32>, error: String },
    Progress { progress: u8 },
    StopRequested,
    RunCompleted { result_count: usize },
    RunFailed { error: String },
    AggregationCompleted { chars: usize },
    AggregationFailed { error: String },
}
