//! Orchestrator facade
//!
//! Validates run requests, resolves agents through the registry, creates
//! sessions and drives them on background tasks. The HTTP layer only talks
//! to this type.
//!
//! Every run is spawned as a driver task owned by a supervisor task. The
//! supervisor turns driver errors and panics into a failed session, so a
//! session always reaches a terminal state.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use promptlink_common::{
    AgentDescriptor, AgentOutcome, ChatMessage, ChatReply, CompatibilityReport, EventSource,
    EventType, PairSuggestion, RelayError, RelayResult, ReportFormat, ResultsView, RunRequest,
    SessionId, SessionStatus, SessionSummary, StatusEvent, StatusView, Strategy, SystemConfig,
};

use crate::agents::AgentRegistry;
use crate::aggregator::Aggregator;
use crate::compatibility;
use crate::llm::{InvocationOptions, ModelInvoker, OpenRouterClient};
use crate::report;
use crate::runners::{RunContext, RunPlan};
use crate::session::{Session, SessionHandle};
use crate::session_store::SessionStore;

/// Core orchestrator for multi-agent runs
pub struct Orchestrator {
    config: Arc<SystemConfig>,
    registry: Arc<AgentRegistry>,
    invoker: Arc<dyn ModelInvoker>,
    store: Arc<SessionStore>,
    options: InvocationOptions,
}

impl Orchestrator {
    pub fn new(config: SystemConfig, registry: AgentRegistry, invoker: Arc<dyn ModelInvoker>) -> Self {
        let options = InvocationOptions::from_config(&config.provider);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            invoker,
            store: Arc::new(SessionStore::new()),
            options,
        }
    }

    /// Wire up the registry and the HTTP invoker from configuration
    pub fn from_config(config: SystemConfig) -> RelayResult<Self> {
        let registry = AgentRegistry::from_config(&config)?;
        if config.provider.api_key_from_env().is_none() {
            warn!(
                env = %config.provider.api_key_env,
                "Provider API key not set, every invocation will fail with a configuration error"
            );
        }
        let invoker: Arc<dyn ModelInvoker> = Arc::new(OpenRouterClient::from_config(&config.provider));
        Ok(Self::new(config, registry, invoker))
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Validate a request, create its session and start it in the background.
    ///
    /// Returns as soon as the session is stored; no session is created when
    /// validation fails.
    #[instrument(name = "start_run", skip(self, request), fields(strategy = %request.strategy))]
    pub async fn start_run(&self, request: RunRequest) -> RelayResult<SessionId> {
        let plan = self.plan(&request).await?;

        let session = Session::new(request.prompt.clone(), plan.strategy(), plan.total_units());
        let session_id = session.id.clone();
        let handle = Arc::new(SessionHandle::new(session));
        self.store.insert(Arc::clone(&handle));

        let concurrency = request
            .concurrency
            .unwrap_or(self.config.orchestration.max_concurrency);
        let ctx = RunContext {
            session: Arc::clone(&handle),
            invoker: Arc::clone(&self.invoker),
            options: self.options.clone(),
            system: self.system_for(&request),
            concurrency,
        };

        let aggregator = request
            .aggregate
            .unwrap_or(self.config.orchestration.aggregate_by_default)
            .then(|| self.aggregator(request.aggregator_model.clone()));

        info!(
            session_id = %session_id,
            units = plan.total_units(),
            aggregate = aggregator.is_some(),
            "Run accepted"
        );

        let driver = tokio::spawn(drive(ctx, plan, request.prompt, aggregator));
        tokio::spawn(supervise(handle, driver));

        Ok(session_id)
    }

    async fn plan(&self, request: &RunRequest) -> RelayResult<RunPlan> {
        if request.prompt.trim().is_empty() {
            return Err(RelayError::invalid_input("prompt must not be empty"));
        }
        if request.concurrency == Some(0) {
            return Err(RelayError::invalid_input("concurrency must be at least 1"));
        }

        if request.moderator.is_some() && request.strategy != Strategy::Chain {
            return Err(RelayError::invalid_input("a moderator is only supported for chain runs"));
        }

        let limits = &self.config.orchestration;
        match request.strategy {
            Strategy::Panel => Ok(RunPlan::Panel {
                agents: self.select_agents(request.agents.as_deref()).await?,
            }),
            Strategy::Chain => {
                let moderator = match &request.moderator {
                    Some(id) => Some(self.resolve_selected(id).await?),
                    None => None,
                };
                Ok(RunPlan::Chain {
                    agents: self.select_agents(request.agents.as_deref()).await?,
                    max_transcript_chars: limits.max_transcript_chars,
                    moderator,
                })
            }
            Strategy::Pairs => {
                let requested = request.pairs.as_deref().unwrap_or_default();
                if requested.is_empty() {
                    return Err(RelayError::invalid_input("pairs run needs at least one pair"));
                }
                if requested.len() > limits.max_pairs {
                    return Err(RelayError::invalid_input(format!(
                        "at most {} pairs are allowed, got {}",
                        limits.max_pairs,
                        requested.len()
                    )));
                }

                let rounds = request.rounds.unwrap_or(limits.default_rounds);
                if rounds == 0 || rounds > limits.max_rounds {
                    return Err(RelayError::invalid_input(format!(
                        "rounds must be between 1 and {}",
                        limits.max_rounds
                    )));
                }

                let mut pairs = Vec::with_capacity(requested.len());
                for pair in requested {
                    match pair.as_slice() {
                        [a, b] => pairs.push((
                            self.resolve_selected(a).await?,
                            self.resolve_selected(b).await?,
                        )),
                        _ => {
                            return Err(RelayError::invalid_input(format!(
                                "each pair needs exactly two agents, got {}",
                                pair.len()
                            )))
                        }
                    }
                }
                Ok(RunPlan::Pairs { pairs, rounds })
            }
        }
    }

    async fn select_agents(&self, ids: Option<&[String]>) -> RelayResult<Vec<AgentDescriptor>> {
        let agents = match ids {
            Some(ids) => {
                let mut agents = Vec::with_capacity(ids.len());
                for id in ids {
                    agents.push(self.resolve_selected(id).await?);
                }
                agents
            }
            None => self.registry.active_agents().await,
        };
        if agents.is_empty() {
            return Err(RelayError::invalid_input("agent selection resolved to no agents"));
        }
        Ok(agents)
    }

    /// Unknown ids in a run request are caller errors
    async fn resolve_selected(&self, id: &str) -> RelayResult<AgentDescriptor> {
        self.registry.lookup(id).await.map_err(|e| match e {
            RelayError::NotFound { resource_id, .. } => {
                RelayError::invalid_input(format!("unknown agent '{}'", resource_id))
            }
            other => other,
        })
    }

    fn system_for(&self, request: &RunRequest) -> Option<String> {
        if let Some(system) = request.system.as_ref().filter(|s| !s.trim().is_empty()) {
            return Some(system.clone());
        }
        let defaults = &self.config.orchestration;
        match request.strategy {
            Strategy::Panel => None,
            Strategy::Pairs => Some(defaults.pairs_system.clone()),
            Strategy::Chain => Some(defaults.chain_system.clone()),
        }
    }

    fn aggregator(&self, model: Option<String>) -> Aggregator {
        let orchestration = &self.config.orchestration;
        Aggregator::new(
            Arc::clone(&self.invoker),
            model.unwrap_or_else(|| orchestration.aggregator_model.clone()),
            orchestration.aggregator_snippet_chars,
            &self.options,
        )
    }

    pub async fn status(&self, id: &SessionId) -> RelayResult<StatusView> {
        Ok(self.store.get(id)?.status().await)
    }

    pub async fn results(&self, id: &SessionId) -> RelayResult<ResultsView> {
        Ok(self.store.get(id)?.results().await)
    }

    pub async fn report(&self, id: &SessionId, format: ReportFormat) -> RelayResult<String> {
        let snapshot = self.store.get(id)?.snapshot().await;
        report::render(&snapshot, format)
    }

    /// Request a stop. Idempotent and a no-op on terminal sessions.
    #[instrument(name = "stop_run", skip(self))]
    pub async fn stop(&self, id: &SessionId) -> RelayResult<StatusView> {
        let handle = self.store.get(id)?;
        if !handle.request_stop().await {
            debug!(session_id = %id, "Stop ignored");
        }
        Ok(handle.status().await)
    }

    /// Aggregate a completed session on demand and attach the report
    #[instrument(name = "aggregate_run", skip(self))]
    pub async fn aggregate(&self, id: &SessionId, model: Option<String>) -> RelayResult<String> {
        let handle = self.store.get(id)?;
        let snapshot = handle.snapshot().await;
        if snapshot.status != SessionStatus::Completed {
            return Err(RelayError::InvalidStateTransition {
                from: snapshot.status.to_string(),
                to: "aggregate".to_string(),
            });
        }

        let aggregator = self.aggregator(model);
        match aggregator
            .summarize(snapshot.strategy.report_title(), &snapshot.prompt, &snapshot.results)
            .await
        {
            Ok(report) => {
                handle.attach_report(report.clone()).await?;
                Ok(report)
            }
            Err(RelayError::Invoke(e)) => {
                handle.attach_aggregation_error(e.to_string()).await?;
                Err(RelayError::Invoke(e))
            }
            Err(other) => Err(other),
        }
    }

    /// Live events of a session plus a snapshot taken after subscribing.
    ///
    /// When the snapshot is finalized no further events will arrive.
    pub async fn subscribe(
        &self,
        id: &SessionId,
    ) -> RelayResult<(broadcast::Receiver<StatusEvent>, Session)> {
        let handle = self.store.get(id)?;
        let receiver = handle.subscribe();
        let snapshot = handle.snapshot().await;
        Ok((receiver, snapshot))
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    /// Single synchronous call to one agent
    #[instrument(name = "chat", skip(self, message, system))]
    pub async fn chat(
        &self,
        agent_id: &str,
        message: &str,
        system: Option<&str>,
    ) -> RelayResult<ChatReply> {
        if message.trim().is_empty() {
            return Err(RelayError::invalid_input("message must not be empty"));
        }
        let agent = self.registry.lookup(agent_id).await?;

        let system = match system.filter(|s| !s.trim().is_empty()) {
            Some(system) => system.to_string(),
            None => default_chat_system(&agent),
        };
        let messages = vec![ChatMessage::system(system), ChatMessage::user(message)];
        let response = self.invoker.invoke(&agent.model, &messages, &self.options).await?;

        Ok(ChatReply {
            agent_id: agent.id,
            agent_name: agent.name,
            model: agent.model,
            response,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Same message to several agents, replies in request order.
    ///
    /// Unknown ids are skipped; failed calls come back as failed outcomes.
    #[instrument(name = "batch_chat", skip(self, message, system), fields(agents = agent_ids.len()))]
    pub async fn batch_chat(
        &self,
        agent_ids: &[String],
        message: &str,
        system: Option<&str>,
    ) -> RelayResult<Vec<AgentOutcome>> {
        if message.trim().is_empty() {
            return Err(RelayError::invalid_input("message must not be empty"));
        }
        if agent_ids.is_empty() {
            return Err(RelayError::invalid_input("agent_ids must not be empty"));
        }

        let mut agents = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            match self.registry.lookup(id).await {
                Ok(agent) => agents.push(agent),
                Err(RelayError::NotFound { .. }) => debug!(agent_id = %id, "Skipping unknown agent"),
                Err(e) => return Err(e),
            }
        }
        if agents.is_empty() {
            return Err(RelayError::invalid_input("none of the requested agents are known"));
        }

        let system = system.filter(|s| !s.trim().is_empty());
        let cap = self.config.orchestration.max_concurrency.min(agents.len()).max(1);
        let calls = agents.into_iter().map(|agent| {
            let invoker = Arc::clone(&self.invoker);
            let options = self.options.clone();
            let messages = vec![
                ChatMessage::system(system.map_or_else(|| default_chat_system(&agent), str::to_string)),
                ChatMessage::user(message),
            ];
            async move {
                let result = invoker.invoke(&agent.model, &messages, &options).await;
                AgentOutcome::from_result(&agent, result)
            }
        });
        let outcomes: Vec<AgentOutcome> = stream::iter(calls).buffered(cap).collect().await;

        info!(
            replies = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            "Batch chat completed"
        );
        Ok(outcomes)
    }

    /// Score two agents as a debate pair
    pub async fn compatibility(&self, agent_a: &str, agent_b: &str) -> RelayResult<CompatibilityReport> {
        if agent_a.trim().is_empty() || agent_b.trim().is_empty() {
            return Err(RelayError::invalid_input("both agents are required"));
        }
        let a = self.registry.lookup(agent_a).await?;
        let b = self.registry.lookup(agent_b).await?;
        Ok(compatibility::compatibility(&a, &b))
    }

    /// Ask the aggregator model which active agents to pair for a task
    #[instrument(name = "suggest_pair", skip(self, context))]
    pub async fn suggest_pair(
        &self,
        task_type: Option<&str>,
        primary_agent: Option<&str>,
        context: Option<&str>,
    ) -> RelayResult<PairSuggestion> {
        let task_type = task_type
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TASK_TYPE)
            .to_string();
        let primary = match primary_agent.filter(|id| !id.trim().is_empty()) {
            Some(id) => Some(self.resolve_selected(id).await?),
            None => None,
        };

        let roster = self.registry.active_agents().await;
        let prompt = build_pairing_prompt(&task_type, primary.as_ref(), context.unwrap_or(""), &roster);
        let model = self.config.orchestration.aggregator_model.clone();
        let options = self
            .options
            .clone()
            .with_temperature(PAIRING_TEMPERATURE)
            .with_max_tokens(PAIRING_MAX_TOKENS);
        let messages = vec![ChatMessage::system(PAIRING_SYSTEM), ChatMessage::user(prompt)];
        let analysis = self.invoker.invoke(&model, &messages, &options).await?;

        Ok(PairSuggestion {
            task_type,
            model,
            analysis,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Remove expired terminal sessions
    pub async fn cleanup_expired_sessions(&self) -> usize {
        self.store
            .cleanup_expired(self.config.orchestration.session_ttl())
            .await
    }
}

const DEFAULT_TASK_TYPE: &str = "general";
const PAIRING_SYSTEM: &str = "You are an AI pairing expert who understands agent capabilities \
and optimal combinations for different tasks.";
const PAIRING_TEMPERATURE: f32 = 0.3;
const PAIRING_MAX_TOKENS: u32 = 1500;

fn build_pairing_prompt(
    task_type: &str,
    primary: Option<&AgentDescriptor>,
    context: &str,
    roster: &[AgentDescriptor],
) -> String {
    let agents: Vec<String> = roster.iter().map(describe_for_pairing).collect();
    format!(
        "Recommend the optimal AI agent pairing for this task.\n\n\
         Task type: {}\n\
         Primary agent: {}\n\
         Context: {}\n\n\
         Available agents:\n{}\n\n\
         Provide:\n\
         1. RECOMMENDED PAIR: best two agents for this task, by id\n\
         2. REASONING: why this pairing works well\n\
         3. EXPECTED SYNERGY: how they complement each other\n\
         4. ALTERNATIVE PAIRS: 2-3 backup options",
        task_type,
        primary.map_or("not specified", |a| a.id.as_str()),
        if context.trim().is_empty() { "none" } else { context },
        agents.join("\n")
    )
}

fn describe_for_pairing(agent: &AgentDescriptor) -> String {
    let mut line = format!("- {} ({})", agent.id, agent.name);
    if let Some(profile) = &agent.profile {
        if let Some(personality) = &profile.personality {
            line.push_str(&format!("; personality: {}", personality));
        }
        if !profile.strengths.is_empty() {
            line.push_str(&format!("; strengths: {}", profile.strengths.join(", ")));
        }
        if !profile.best_pairs.is_empty() {
            line.push_str(&format!("; works well with: {}", profile.best_pairs.join(", ")));
        }
    } else if let Some(notes) = &agent.notes {
        line.push_str(&format!("; {}", notes));
    }
    line
}

fn default_chat_system(agent: &AgentDescriptor) -> String {
    match &agent.notes {
        Some(notes) => format!(
            "You are {}. {}. Collaborate effectively and provide insightful responses.",
            agent.name,
            notes.trim_end_matches('.')
        ),
        None => format!(
            "You are {}. Collaborate effectively and provide insightful responses.",
            agent.name
        ),
    }
}

/// start -> execute -> finish -> optional aggregation -> terminal event
async fn drive(
    ctx: RunContext,
    plan: RunPlan,
    prompt: String,
    aggregator: Option<Aggregator>,
) -> RelayResult<()> {
    ctx.session.start().await?;
    plan.execute(&ctx, &prompt).await?;
    ctx.session.finish().await?;

    if let Some(aggregator) = aggregator {
        let snapshot = ctx.session.snapshot().await;
        if snapshot.stop_requested {
            debug!(session_id = %snapshot.id, "Skipping aggregation for stopped run");
        } else if snapshot.success_count() == 0 {
            info!(session_id = %snapshot.id, "Skipping aggregation, no agent succeeded");
        } else {
            let source = EventSource::Aggregator {
                model: aggregator.model().to_string(),
            };
            match aggregator
                .summarize(plan.strategy().report_title(), &prompt, &snapshot.results)
                .await
            {
                Ok(report) => {
                    let chars = report.chars().count();
                    ctx.session.attach_report(report).await?;
                    ctx.session.emit(source, EventType::AggregationCompleted { chars });
                }
                Err(e) => {
                    warn!(session_id = %snapshot.id, "Aggregation failed: {}", e);
                    ctx.session.attach_aggregation_error(e.to_string()).await?;
                    ctx.session.emit(source, EventType::AggregationFailed { error: e.to_string() });
                }
            }
        }
    }

    ctx.session.finalize().await;
    Ok(())
}

async fn supervise(handle: Arc<SessionHandle>, driver: JoinHandle<RelayResult<()>>) {
    let failure = match driver.await {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(e) => RelayError::from(e).to_string(),
    };

    error!(session_id = %handle.id(), "Run failed: {}", failure);
    if let Err(e) = handle.fail(failure).await {
        // Already terminal; make sure subscribers still see the end
        warn!(session_id = %handle.id(), "Could not mark session failed: {}", e);
        handle.finalize().await;
    }
}
