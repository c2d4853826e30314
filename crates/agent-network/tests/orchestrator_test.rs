//! Integration tests for orchestrator

mod common;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use common::{
    numbered_agents, orchestrator_over, test_orchestrator, test_orchestrator_with, ScriptedInvoker,
};
use promptlink_common::{
    AgentDescriptor, AgentProfile, ChatMessage, CompatibilityLevel, EventType, InvokeError,
    RelayError, ReportFormat, RunRequest, SessionId, SessionStatus, StatusView, Strategy,
    SystemConfig, TurnPhase,
};
use promptlink_network::runners::chain::{MODERATOR_SYSTEM, NO_PRIOR_CONTRIBUTIONS};
use promptlink_network::{
    AgentRegistry, InvocationOptions, ModelInvoker, Orchestrator, RemoteCatalog,
};
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Poll until the session is terminal, asserting progress never decreases
async fn wait_for_terminal(orchestrator: &Orchestrator, id: &SessionId) -> StatusView {
    let mut last_progress = 0;
    for _ in 0..500 {
        let status = orchestrator.status(id).await.unwrap();
        assert!(status.progress >= last_progress, "progress went backwards");
        last_progress = status.progress;
        if status.status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {} never reached a terminal state", id);
}

fn timeout_error(model: &str) -> InvokeError {
    InvokeError::unavailable(model, "operation timed out")
}

// ============================================================================
// Panel
// ============================================================================

#[tokio::test]
async fn test_panel_with_one_timeout_completes_with_three_results() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().fail("vendor/beta", timeout_error("vendor/beta")));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("Compare caching strategies", Strategy::Panel).with_agents([
            "alpha", "beta", "gamma",
        ]))
        .await?;

    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);
    assert_eq!(status.progress, 100);

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 3);
    let failed: Vec<_> = results.results.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].agent_id, "beta");
    assert!(failed[0].response.is_none());
    assert!(failed[0].error.as_deref().unwrap().contains("timed out"));

    for call in invoker.calls() {
        assert!(call.text().contains("Compare caching strategies"));
    }
    Ok(())
}

#[tokio::test]
async fn test_panel_defaults_to_active_agents() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    assert_eq!(orchestrator.results(&id).await?.results.len(), 3);
    assert_eq!(invoker.calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_panel_all_failures_still_completes() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .fail("vendor/alpha", InvokeError::Configuration("missing key".into()))
            .fail("vendor/beta", InvokeError::Configuration("missing key".into())),
    );
    let orchestrator = test_orchestrator(invoker);

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(["alpha", "beta"]))
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;

    assert_eq!(status.status, SessionStatus::Completed);
    let results = orchestrator.results(&id).await?;
    assert!(results.results.iter().all(|r| r.error.is_some()));
    Ok(())
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_panel_respects_concurrency_cap() -> Result<()> {
    let mut invoker = ScriptedInvoker::new();
    for agent in numbered_agents(5) {
        invoker = invoker.delay(&agent.model, Duration::from_millis(50));
    }
    let invoker = Arc::new(invoker);
    let registry = AgentRegistry::new(numbered_agents(5))?;
    let orchestrator = orchestrator_over(registry, SystemConfig::default(), invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("cap", Strategy::Panel).with_concurrency(2))
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);

    assert_eq!(orchestrator.results(&id).await?.results.len(), 5);
    assert_eq!(invoker.calls().len(), 5);
    assert_eq!(invoker.max_in_flight(), 2);
    Ok(())
}

#[tokio::test]
async fn test_panel_records_in_completion_order() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/alpha", Duration::from_millis(150)));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(
            RunRequest::new("race", Strategy::Panel)
                .with_agents(["alpha", "beta", "gamma"])
                .with_concurrency(3),
        )
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let results = orchestrator.results(&id).await?;
    let order: Vec<_> = results.results.iter().map(|r| r.agent_id.as_str()).collect();
    assert_eq!(order.len(), 3);
    assert_eq!(order[2], "alpha");
    Ok(())
}

#[tokio::test]
async fn test_stop_mid_panel_skips_undispatched_agents() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/alpha", Duration::from_millis(200)));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(
            RunRequest::new("slow", Strategy::Panel)
                .with_agents(["alpha", "beta", "gamma"])
                .with_concurrency(1),
        )
        .await?;

    while invoker.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    orchestrator.stop(&id).await?;

    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);
    assert!(status.stop_requested);

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].agent_id, "alpha");
    assert!(results.results[0].cancelled);
    assert!(invoker.calls_for("vendor/beta").is_empty());
    assert!(invoker.calls_for("vendor/gamma").is_empty());
    Ok(())
}

#[tokio::test]
async fn test_panel_over_catalog_only_agent() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "agents": {
                "yi-large": {"name": "Yi Large", "model": "01-ai/yi-large", "active": true}
            }
        })))
        .mount(&server)
        .await;

    let invoker = Arc::new(ScriptedInvoker::new().reply("01-ai/yi-large", "from the catalog"));
    let registry = AgentRegistry::new(common::test_agents())?
        .with_catalog(RemoteCatalog::new(server.uri(), Duration::from_secs(2)));
    let orchestrator = orchestrator_over(registry, SystemConfig::default(), invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(["yi-large", "alpha"]))
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 2);
    let yi = results
        .results
        .iter()
        .find(|r| r.agent_id == "yi-large")
        .expect("catalog agent result");
    assert_eq!(yi.response.as_deref(), Some("from the catalog"));
    assert_eq!(yi.model, "01-ai/yi-large");
    Ok(())
}

#[tokio::test]
async fn test_empty_agent_set_is_invalid_and_creates_no_session() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = test_orchestrator(invoker.clone());

    let result = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(Vec::<String>::new()))
        .await;

    assert!(matches!(result, Err(RelayError::InvalidInput(_))));
    assert!(orchestrator.store().is_empty());
    assert!(invoker.calls().is_empty());

    let lookup = orchestrator.status(&SessionId::from_string("fabricated")).await;
    assert!(matches!(lookup, Err(RelayError::NotFound { .. })));
}

#[tokio::test]
async fn test_blank_prompt_and_unknown_agent_rejected() {
    let orchestrator = test_orchestrator(Arc::new(ScriptedInvoker::new()));

    let blank = orchestrator
        .start_run(RunRequest::new("   ", Strategy::Chain))
        .await;
    assert!(matches!(blank, Err(RelayError::InvalidInput(_))));

    let unknown = orchestrator
        .start_run(RunRequest::new("hi", Strategy::Panel).with_agents(["alpha", "omega"]))
        .await;
    match unknown {
        Err(RelayError::InvalidInput(msg)) => assert!(msg.contains("omega")),
        other => panic!("expected invalid input, got {:?}", other),
    }
    assert!(orchestrator.store().is_empty());
}

#[tokio::test]
async fn test_pairs_validation() {
    let orchestrator = test_orchestrator(Arc::new(ScriptedInvoker::new()));

    let no_pairs = orchestrator
        .start_run(RunRequest::new("debate", Strategy::Pairs))
        .await;
    assert!(matches!(no_pairs, Err(RelayError::InvalidInput(_))));

    let mut triple = RunRequest::new("debate", Strategy::Pairs);
    triple.pairs = Some(vec![vec!["alpha".into(), "beta".into(), "gamma".into()]]);
    assert!(matches!(
        orchestrator.start_run(triple).await,
        Err(RelayError::InvalidInput(_))
    ));

    let zero_rounds = RunRequest::new("debate", Strategy::Pairs)
        .with_pair("alpha", "beta")
        .with_rounds(0);
    assert!(matches!(
        orchestrator.start_run(zero_rounds).await,
        Err(RelayError::InvalidInput(_))
    ));

    let mut too_many = RunRequest::new("debate", Strategy::Pairs);
    for _ in 0..11 {
        too_many = too_many.with_pair("alpha", "beta");
    }
    assert!(matches!(
        orchestrator.start_run(too_many).await,
        Err(RelayError::InvalidInput(_))
    ));
}

// ============================================================================
// Chain
// ============================================================================

#[tokio::test]
async fn test_chain_of_two_passes_transcript() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply("vendor/alpha", "ALPHA-INSIGHT-42")
            .reply("vendor/beta", "beta builds on it"),
    );
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("X", Strategy::Chain).with_agents(["alpha", "beta"]))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let calls = invoker.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].model, "vendor/alpha");
    assert!(calls[0].text().contains("X"));
    assert!(calls[0].text().contains(NO_PRIOR_CONTRIBUTIONS));
    assert!(!calls[0].text().contains("ALPHA-INSIGHT-42"));

    assert_eq!(calls[1].model, "vendor/beta");
    assert!(calls[1].text().contains("X"));
    assert!(calls[1].text().contains("[Alpha]: ALPHA-INSIGHT-42"));

    let results = orchestrator.results(&id).await?;
    let order: Vec<_> = results.results.iter().map(|r| r.agent_id.as_str()).collect();
    assert_eq!(order, vec!["alpha", "beta"]);
    Ok(())
}

#[tokio::test]
async fn test_chain_of_three_records_error_marker() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply("vendor/alpha", "first idea")
            .fail(
                "vendor/beta",
                InvokeError::UpstreamError {
                    model: "vendor/beta".into(),
                    status: 503,
                    body: "overloaded".into(),
                },
            )
            .reply("vendor/gamma", "third idea"),
    );
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("Plan a launch", Strategy::Chain).with_agents([
            "alpha", "beta", "gamma",
        ]))
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);

    let gamma = &invoker.calls_for("vendor/gamma")[0];
    assert!(gamma.text().contains("[Alpha]: first idea"));
    assert!(gamma.text().contains("[Beta]: [error:"));
    assert!(gamma.text().contains("503"));

    let system = &gamma.messages[0];
    assert_eq!(system.content, SystemConfig::default().orchestration.chain_system);
    Ok(())
}

#[tokio::test]
async fn test_stop_mid_chain_skips_remaining_turns() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/alpha", Duration::from_millis(200)));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("slow", Strategy::Chain).with_agents([
            "alpha", "beta", "gamma",
        ]))
        .await?;

    // Let the first turn get in flight
    while invoker.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let stopped = orchestrator.stop(&id).await?;
    assert!(stopped.stop_requested);

    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 1);
    assert!(results.results[0].cancelled);
    assert_eq!(invoker.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_moderated_chain_opens_and_synthesizes() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply("vendor/alpha", "ALPHA-POINT")
            .reply("vendor/beta", "BETA-POINT"),
    );
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(
            RunRequest::new("Plan a launch", Strategy::Chain)
                .with_agents(["alpha", "beta"])
                .with_moderator("gamma"),
        )
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Completed);
    assert_eq!(status.progress, 100);

    let results = orchestrator.results(&id).await?.results;
    let order: Vec<_> = results.iter().map(|r| r.agent_id.as_str()).collect();
    assert_eq!(order, vec!["gamma", "alpha", "beta", "gamma"]);
    assert_eq!(results[0].phase, Some(TurnPhase::Opening));
    assert_eq!(results[1].phase, None);
    assert_eq!(results[3].phase, Some(TurnPhase::Synthesis));

    let calls = invoker.calls();
    assert_eq!(calls[0].messages[0].content, MODERATOR_SYSTEM);
    assert!(calls[0].text().contains("Alpha, Beta"));
    assert!(calls[1].text().contains("[Gamma (moderator)]: reply from vendor/gamma"));
    assert!(!calls[1].text().contains(NO_PRIOR_CONTRIBUTIONS));
    assert!(calls[3].text().contains("[Alpha]: ALPHA-POINT"));
    assert!(calls[3].text().contains("[Beta]: BETA-POINT"));
    Ok(())
}

#[tokio::test]
async fn test_moderator_rejected_outside_chain_and_when_unknown() {
    let orchestrator = test_orchestrator(Arc::new(ScriptedInvoker::new()));

    let panel = orchestrator
        .start_run(RunRequest::new("p", Strategy::Panel).with_moderator("gamma"))
        .await;
    assert!(matches!(panel, Err(RelayError::InvalidInput(_))));

    let unknown = orchestrator
        .start_run(RunRequest::new("p", Strategy::Chain).with_moderator("omega"))
        .await;
    assert!(matches!(unknown, Err(RelayError::InvalidInput(_))));
    assert!(orchestrator.list_sessions().await.is_empty());
}

#[tokio::test]
async fn test_stop_during_opening_skips_every_turn() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/gamma", Duration::from_millis(200)));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(
            RunRequest::new("slow", Strategy::Chain)
                .with_agents(["alpha", "beta"])
                .with_moderator("gamma"),
        )
        .await?;
    while invoker.calls().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    orchestrator.stop(&id).await?;
    wait_for_terminal(&orchestrator, &id).await;

    let results = orchestrator.results(&id).await?.results;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].phase, Some(TurnPhase::Opening));
    assert!(results[0].cancelled);
    assert_eq!(invoker.calls().len(), 1);
    Ok(())
}

// ============================================================================
// Pairs
// ============================================================================

#[tokio::test]
async fn test_pairs_run_records_every_leg() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = test_orchestrator(invoker.clone());

    let request = RunRequest::new("Tabs or spaces?", Strategy::Pairs)
        .with_pair("alpha", "beta")
        .with_pair("gamma", "alpha")
        .with_rounds(2);
    let id = orchestrator.start_run(request).await?;
    wait_for_terminal(&orchestrator, &id).await;

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 2 * 2 * 2);
    assert!(results.results.iter().all(|r| r.round.is_some()));
    assert_eq!(
        results.results.iter().filter(|r| r.round == Some(2)).count(),
        4
    );

    // B sees A's reply and the follow-up instruction
    let beta = &invoker.calls_for("vendor/beta")[0];
    assert!(beta.text().contains("reply from vendor/alpha"));
    assert!(beta.text().contains("Respond to the above, challenge assumptions briefly."));
    Ok(())
}

#[tokio::test]
async fn test_pairs_failed_leg_continues_with_marker() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().fail("vendor/alpha", timeout_error("vendor/alpha")));
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(
            RunRequest::new("debate", Strategy::Pairs)
                .with_pair("alpha", "beta")
                .with_rounds(1),
        )
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let results = orchestrator.results(&id).await?;
    assert_eq!(results.results.len(), 2);
    let beta = &invoker.calls_for("vendor/beta")[0];
    assert!(beta.text().contains("[Agent could not respond:"));
    Ok(())
}

// ============================================================================
// Lifecycle properties
// ============================================================================

#[tokio::test]
async fn test_results_are_idempotent_and_stop_is_noop_after_completion() -> Result<()> {
    let orchestrator = test_orchestrator(Arc::new(ScriptedInvoker::new()));

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let first = orchestrator.results(&id).await?;
    let stopped = orchestrator.stop(&id).await?;
    assert!(!stopped.stop_requested);
    assert_eq!(stopped.status, SessionStatus::Completed);
    let second = orchestrator.results(&id).await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_report_requires_results() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/alpha", Duration::from_millis(300)));
    let orchestrator = test_orchestrator(invoker);

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Chain).with_agents(["alpha"]))
        .await?;
    let early = orchestrator.report(&id, ReportFormat::Html).await;
    assert!(matches!(early, Err(RelayError::NoResults(_))));

    wait_for_terminal(&orchestrator, &id).await;
    let html = orchestrator.report(&id, ReportFormat::Html).await?;
    assert!(html.contains("Conference Chain Report"));
    assert!(html.contains("reply from vendor/alpha"));
    Ok(())
}

#[tokio::test]
async fn test_subscribe_sees_lifecycle_events() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().delay("vendor/alpha", Duration::from_millis(50)));
    let orchestrator = test_orchestrator(invoker);

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(["alpha"]))
        .await?;
    let (mut rx, snapshot) = orchestrator.subscribe(&id).await?;
    assert!(!snapshot.finalized);

    let mut saw_completed = false;
    while let Ok(event) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await? {
        if let EventType::RunCompleted { result_count } = event.event {
            assert_eq!(result_count, 1);
            saw_completed = true;
            break;
        }
    }
    assert!(saw_completed);
    Ok(())
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_aggregation_with_partial_failure_produces_report() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .fail("vendor/gamma", timeout_error("vendor/gamma"))
            .reply("openai/gpt-5", "## Executive summary\nAll good."),
    );
    let orchestrator = test_orchestrator(invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_aggregation(None))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    // The report is attached before the terminal event; poll for it
    let mut results = orchestrator.results(&id).await?;
    for _ in 0..100 {
        if results.report.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        results = orchestrator.results(&id).await?;
    }

    let report = results.report.expect("aggregated report");
    assert!(!report.is_empty());
    assert_eq!(results.status, SessionStatus::Completed);

    let aggregator_call = &invoker.calls_for("openai/gpt-5")[0];
    assert!(aggregator_call.text().contains("- [Gamma] (no output:"));
    assert!(aggregator_call.text().contains("- [Alpha] reply from vendor/alpha"));
    Ok(())
}

#[tokio::test]
async fn test_aggregation_failure_keeps_raw_results() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().fail(
        "summarizer/model",
        InvokeError::malformed("summarizer/model", "missing choices"),
    ));
    let orchestrator = test_orchestrator(invoker);

    let id = orchestrator
        .start_run(
            RunRequest::new("hello", Strategy::Panel)
                .with_agents(["alpha", "beta"])
                .with_aggregation(Some("summarizer/model".to_string())),
        )
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let mut results = orchestrator.results(&id).await?;
    for _ in 0..100 {
        if results.aggregation_error.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        results = orchestrator.results(&id).await?;
    }

    assert_eq!(results.status, SessionStatus::Completed);
    assert_eq!(results.results.len(), 2);
    assert!(results.report.is_none());
    assert!(results.aggregation_error.unwrap().contains("missing choices"));
    Ok(())
}

#[tokio::test]
async fn test_on_demand_aggregation() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().reply("openai/gpt-5", "merged"));
    let orchestrator = test_orchestrator(invoker);

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(["alpha"]))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    let report = orchestrator.aggregate(&id, None).await?;
    assert_eq!(report, "merged");
    assert_eq!(orchestrator.results(&id).await?.report.as_deref(), Some("merged"));
    Ok(())
}

#[tokio::test]
async fn test_aggregation_on_by_default_from_config() -> Result<()> {
    let mut config = SystemConfig::default();
    config.orchestration.aggregate_by_default = true;
    config.orchestration.aggregator_model = "house/editor".to_string();

    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = test_orchestrator_with(config, invoker.clone());

    let id = orchestrator
        .start_run(RunRequest::new("hello", Strategy::Panel).with_agents(["alpha"]))
        .await?;
    wait_for_terminal(&orchestrator, &id).await;

    for _ in 0..100 {
        if !invoker.calls_for("house/editor").is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(invoker.calls_for("house/editor").len(), 1);
    Ok(())
}

// ============================================================================
// Supervision
// ============================================================================

struct PanickingInvoker;

#[async_trait]
impl ModelInvoker for PanickingInvoker {
    async fn invoke(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _options: &InvocationOptions,
    ) -> Result<String, InvokeError> {
        panic!("invoker exploded")
    }
}

#[tokio::test]
async fn test_panicking_run_task_marks_session_failed() -> Result<()> {
    common::init_test_logging();
    let registry = AgentRegistry::new(common::test_agents())?;
    let orchestrator = Orchestrator::new(SystemConfig::default(), registry, Arc::new(PanickingInvoker));

    let id = orchestrator
        .start_run(RunRequest::new("boom", Strategy::Chain).with_agents(["alpha"]))
        .await?;
    let status = wait_for_terminal(&orchestrator, &id).await;
    assert_eq!(status.status, SessionStatus::Error);

    let results = orchestrator.results(&id).await?;
    let error = results.error.expect("run error");
    assert!(error.starts_with("Task join error"), "{}", error);
    assert!(results.results.is_empty());
    Ok(())
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_uses_default_system_prompt() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().reply("vendor/beta", "hi there"));
    let orchestrator = test_orchestrator(invoker.clone());

    let reply = orchestrator.chat("beta", "hello", None).await?;
    assert_eq!(reply.response, "hi there");
    assert_eq!(reply.agent_name, "Beta");

    let call = &invoker.calls()[0];
    assert!(call.messages[0].content.starts_with("You are Beta."));

    let missing = orchestrator.chat("omega", "hello", None).await;
    assert!(matches!(missing, Err(RelayError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_batch_chat_skips_unknown_and_keeps_order() -> Result<()> {
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .delay("vendor/gamma", Duration::from_millis(50))
            .fail("vendor/beta", timeout_error("vendor/beta")),
    );
    let orchestrator = test_orchestrator(invoker.clone());

    let ids = vec!["gamma".to_string(), "omega".to_string(), "beta".to_string()];
    let outcomes = orchestrator.batch_chat(&ids, "hello", Some("Be brief.")).await?;
    let order: Vec<_> = outcomes.iter().map(|o| o.agent_id.as_str()).collect();
    assert_eq!(order, vec!["gamma", "beta"]);
    assert!(outcomes[0].is_success());
    assert!(!outcomes[1].is_success());
    assert!(invoker
        .calls()
        .iter()
        .all(|c| c.messages[0].content == "Be brief."));

    let none = orchestrator.batch_chat(&["omega".to_string()], "hello", None).await;
    assert!(matches!(none, Err(RelayError::InvalidInput(_))));
    let blank = orchestrator.batch_chat(&ids, "  ", None).await;
    assert!(matches!(blank, Err(RelayError::InvalidInput(_))));
    Ok(())
}

// ============================================================================
// Pairing
// ============================================================================

fn profiled_orchestrator(invoker: Arc<ScriptedInvoker>) -> Result<Orchestrator> {
    let agents = vec![
        AgentDescriptor::new("gpt-4o", "GPT-4o", "openai/gpt-4o").with_profile(
            AgentProfile::new("analytical")
                .with_strengths(["strategic_thinking", "synthesis"])
                .with_best_pairs(["deepseek-r1"]),
        ),
        AgentDescriptor::new("deepseek-r1", "DeepSeek R1", "deepseek/deepseek-r1").with_profile(
            AgentProfile::new("technical").with_strengths(["coding", "problem_solving"]),
        ),
        AgentDescriptor::new("plain", "Plain", "vendor/plain"),
    ];
    Ok(orchestrator_over(AgentRegistry::new(agents)?, SystemConfig::default(), invoker))
}

#[tokio::test]
async fn test_compatibility_between_registered_agents() -> Result<()> {
    let orchestrator = profiled_orchestrator(Arc::new(ScriptedInvoker::new()))?;

    // 25 base + 30 best pair + 20 personalities + 15 diverse strengths
    let report = orchestrator.compatibility("deepseek-r1", "gpt-4o").await?;
    assert_eq!(report.score, 90);
    assert_eq!(report.level, CompatibilityLevel::Excellent);
    assert!(report.recommended);
    assert_eq!(report.agent_a, "deepseek-r1");

    let plain = orchestrator.compatibility("gpt-4o", "plain").await?;
    assert_eq!(plain.score, 25);

    let missing = orchestrator.compatibility("gpt-4o", "omega").await;
    assert!(matches!(missing, Err(RelayError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_suggest_pair_lists_roster_profiles() -> Result<()> {
    let invoker = Arc::new(ScriptedInvoker::new().reply("openai/gpt-5", "Pair gpt-4o with deepseek-r1"));
    let orchestrator = profiled_orchestrator(invoker.clone())?;

    let suggestion = orchestrator
        .suggest_pair(Some("technical_analysis"), Some("gpt-4o"), Some("refactor a parser"))
        .await?;
    assert_eq!(suggestion.task_type, "technical_analysis");
    assert_eq!(suggestion.model, "openai/gpt-5");
    assert_eq!(suggestion.analysis, "Pair gpt-4o with deepseek-r1");

    let call = &invoker.calls_for("openai/gpt-5")[0];
    let text = call.text();
    assert!(text.contains("Primary agent: gpt-4o"));
    assert!(text.contains("refactor a parser"));
    assert!(text.contains("- deepseek-r1 (DeepSeek R1); personality: technical"));
    assert!(text.contains("works well with: deepseek-r1"));

    let defaulted = orchestrator.suggest_pair(None, None, None).await?;
    assert_eq!(defaulted.task_type, "general");

    let unknown = orchestrator.suggest_pair(None, Some("omega"), None).await;
    assert!(matches!(unknown, Err(RelayError::InvalidInput(_))));
    Ok(())
}
