//! Orchestration session state machine
//!
//! A [`Session`] only moves `queued -> running -> {completed, error}`.
//! [`SessionHandle`] serializes access to it: the runner that owns the
//! session is the only writer, while the HTTP layer reads snapshots cloned
//! out under the lock.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use promptlink_common::text::preview;
use promptlink_common::{
    AgentDescriptor, AgentOutcome, EventSource, EventType, RelayError, RelayResult, ResultsView, SessionId,
    SessionStatus, SessionSummary, StatusEvent, StatusView, Strategy,
};

use crate::status_stream::StatusStream;

const PROMPT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub prompt: String,
    pub strategy: Strategy,
    pub status: SessionStatus,
    pub progress: u8,
    pub total_units: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<AgentOutcome>,
    pub error: Option<String>,
    pub report: Option<String>,
    pub aggregation_error: Option<String>,
    pub stop_requested: bool,
    /// The terminal lifecycle event has been broadcast
    pub finalized: bool,
}

impl Session {
    pub fn new(prompt: impl Into<String>, strategy: Strategy, total_units: usize) -> Self {
        Self::with_id(SessionId::new(), prompt, strategy, total_units)
    }

    pub fn with_id(
        id: SessionId,
        prompt: impl Into<String>,
        strategy: Strategy,
        total_units: usize,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            strategy,
            status: SessionStatus::Queued,
            progress: 0,
            total_units,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            results: Vec::new(),
            error: None,
            report: None,
            aggregation_error: None,
            stop_requested: false,
            finalized: false,
        }
    }

    fn transition(&mut self, to: SessionStatus) -> RelayResult<()> {
        let allowed = matches!(
            (self.status, to),
            (SessionStatus::Queued, SessionStatus::Running)
                | (SessionStatus::Running, SessionStatus::Completed)
                | (SessionStatus::Running, SessionStatus::Error)
        );
        if !allowed {
            return Err(RelayError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self) -> RelayResult<()> {
        self.transition(SessionStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Append an outcome and advance progress; progress never decreases
    pub fn record_result(&mut self, outcome: AgentOutcome) -> RelayResult<()> {
        if self.status != SessionStatus::Running {
            return Err(RelayError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "record_result".to_string(),
            });
        }
        self.results.push(outcome);
        if self.total_units > 0 {
            let computed = (self.results.len() * 100 / self.total_units).min(100) as u8;
            self.progress = self.progress.max(computed);
        }
        Ok(())
    }

    pub fn finish(&mut self) -> RelayResult<()> {
        self.transition(SessionStatus::Completed)?;
        self.progress = 100;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the session failed, keeping progress and partial results.
    ///
    /// A queued session passes through running first.
    pub fn fail(&mut self, message: impl Into<String>) -> RelayResult<()> {
        if self.status == SessionStatus::Queued {
            self.start()?;
        }
        self.transition(SessionStatus::Error)?;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Attach the aggregated report; results, status and progress are untouched
    pub fn attach_report(&mut self, report: String) -> RelayResult<()> {
        self.ensure_completed("attach_report")?;
        self.report = Some(report);
        self.aggregation_error = None;
        Ok(())
    }

    pub fn attach_aggregation_error(&mut self, error: String) -> RelayResult<()> {
        self.ensure_completed("attach_aggregation_error")?;
        self.aggregation_error = Some(error);
        Ok(())
    }

    fn ensure_completed(&self, action: &str) -> RelayResult<()> {
        if self.status != SessionStatus::Completed {
            return Err(RelayError::InvalidStateTransition {
                from: self.status.to_string(),
                to: action.to_string(),
            });
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn status_view(&self) -> StatusView {
        StatusView {
            session_id: self.id.to_string(),
            strategy: self.strategy,
            status: self.status,
            progress: self.progress,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            stop_requested: self.stop_requested,
        }
    }

    pub fn results_view(&self) -> ResultsView {
        ResultsView {
            session_id: self.id.to_string(),
            strategy: self.strategy,
            status: self.status,
            results: self.results.clone(),
            error: self.error.clone(),
            report: self.report.clone(),
            aggregation_error: self.aggregation_error.clone(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.to_string(),
            strategy: self.strategy,
            status: self.status,
            progress: self.progress,
            result_count: self.results.len(),
            prompt_preview: preview(&self.prompt, PROMPT_PREVIEW_CHARS),
            created_at: self.created_at,
        }
    }

    /// Event describing how this session ended, for late subscribers
    pub fn terminal_event(&self) -> Option<EventType> {
        match self.status {
            SessionStatus::Completed => Some(EventType::RunCompleted {
                result_count: self.results.len(),
            }),
            SessionStatus::Error => Some(EventType::RunFailed {
                error: self.error.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

/// Shared, lock-protected session with its stop token and event stream
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    state: RwLock<Session>,
    cancel: CancellationToken,
    stream: StatusStream,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        let id = session.id.clone();
        Self {
            stream: StatusStream::new(id.clone()),
            id,
            state: RwLock::new(session),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }

    pub async fn status(&self) -> StatusView {
        self.state.read().await.status_view()
    }

    pub async fn results(&self) -> ResultsView {
        self.state.read().await.results_view()
    }

    pub async fn summary(&self) -> SessionSummary {
        self.state.read().await.summary()
    }

    pub async fn start(&self) -> RelayResult<()> {
        let mut session = self.state.write().await;
        session.start()?;
        info!(session_id = %self.id, strategy = %session.strategy, units = session.total_units, "Session started");
        self.stream.emit_orchestrator(EventType::RunStarted {
            strategy: session.strategy,
            total_units: session.total_units,
        });
        Ok(())
    }

    pub fn emit(&self, source: EventSource, event: EventType) {
        self.stream.emit(source, event);
    }

    pub fn agent_started(&self, agent: &AgentDescriptor, round: Option<u32>) {
        self.stream.emit_agent_started(agent, round);
    }

    /// Record an outcome; replies arriving after a stop are marked cancelled
    pub async fn record(&self, outcome: AgentOutcome) -> RelayResult<()> {
        let outcome = if self.is_stopped() {
            outcome.mark_cancelled()
        } else {
            outcome
        };

        let mut session = self.state.write().await;
        let before = session.progress;
        debug!(
            session_id = %self.id,
            agent = %outcome.agent_id,
            success = outcome.is_success(),
            "Recording agent outcome"
        );
        session.record_result(outcome.clone())?;
        self.stream.emit_outcome(&outcome);
        if session.progress != before {
            self.stream.emit_orchestrator(EventType::Progress {
                progress: session.progress,
            });
        }
        Ok(())
    }

    pub async fn finish(&self) -> RelayResult<()> {
        let mut session = self.state.write().await;
        session.finish()?;
        info!(
            session_id = %self.id,
            results = session.results.len(),
            succeeded = session.success_count(),
            "Session completed"
        );
        Ok(())
    }

    /// Mark failed and broadcast the terminal event
    pub async fn fail(&self, message: impl Into<String>) -> RelayResult<()> {
        let message = message.into();
        let mut session = self.state.write().await;
        session.fail(message.clone())?;
        session.finalized = true;
        warn!(session_id = %self.id, "Session failed: {}", message);
        self.stream
            .emit_orchestrator(EventType::RunFailed { error: message });
        Ok(())
    }

    pub async fn attach_report(&self, report: String) -> RelayResult<()> {
        self.state.write().await.attach_report(report)
    }

    pub async fn attach_aggregation_error(&self, error: String) -> RelayResult<()> {
        self.state.write().await.attach_aggregation_error(error)
    }

    /// Broadcast the terminal event of a completed session once
    pub async fn finalize(&self) {
        let mut session = self.state.write().await;
        if session.finalized {
            return;
        }
        if let Some(event) = session.terminal_event() {
            session.finalized = true;
            self.stream.emit_orchestrator(event);
        }
    }

    /// Request a stop. Returns `false` when the session is already terminal
    /// or a stop was requested before.
    pub async fn request_stop(&self) -> bool {
        let mut session = self.state.write().await;
        if session.is_terminal() || session.stop_requested {
            return false;
        }
        session.stop_requested = true;
        self.cancel.cancel();
        info!(session_id = %self.id, "Stop requested");
        self.stream.emit_orchestrator(EventType::StopRequested);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.stream.subscribe()
    }
}
