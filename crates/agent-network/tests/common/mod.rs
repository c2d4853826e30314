//! Common test utilities for orchestration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use promptlink_common::{AgentDescriptor, ChatMessage, InvokeError, SystemConfig};
use promptlink_network::{AgentRegistry, InvocationOptions, ModelInvoker, Orchestrator};

/// Initialize logging for tests
pub fn init_test_logging() {
    promptlink_common::init_test_tracing();
}

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(InvokeError),
}

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl Call {
    /// Concatenated content of every message, for substring checks
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Test double answering per model, optionally after a delay
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, Script>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, model: &str, text: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), Script::Reply(text.to_string()));
        self
    }

    pub fn fail(self, model: &str, error: InvokeError) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), Script::Fail(error));
        self
    }

    pub fn delay(self, model: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(model.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, model: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.model == model).collect()
    }

    /// Highest number of invocations that were outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _options: &InvocationOptions,
    ) -> Result<String, InvokeError> {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            messages: messages.to_vec(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(model).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let script = self.scripts.lock().unwrap().get(model).cloned();
        match script {
            Some(Script::Reply(text)) => Ok(text),
            Some(Script::Fail(error)) => Err(error),
            None => Ok(format!("reply from {}", model)),
        }
    }
}

/// Three active agents whose model names equal `vendor/<id>`
pub fn test_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new("alpha", "Alpha", "vendor/alpha"),
        AgentDescriptor::new("beta", "Beta", "vendor/beta"),
        AgentDescriptor::new("gamma", "Gamma", "vendor/gamma"),
    ]
}

/// `count` active agents named `agent-0`, `agent-1`, ... with models `vendor/agent-<n>`
pub fn numbered_agents(count: usize) -> Vec<AgentDescriptor> {
    (0..count)
        .map(|n| {
            let id = format!("agent-{}", n);
            AgentDescriptor::new(id.clone(), format!("Agent {}", n), format!("vendor/{}", id))
        })
        .collect()
}

pub fn test_orchestrator(invoker: Arc<ScriptedInvoker>) -> Orchestrator {
    test_orchestrator_with(SystemConfig::default(), invoker)
}

pub fn test_orchestrator_with(config: SystemConfig, invoker: Arc<ScriptedInvoker>) -> Orchestrator {
    init_test_logging();
    let registry = AgentRegistry::new(test_agents()).unwrap();
    Orchestrator::new(config, registry, invoker)
}

pub fn orchestrator_over(
    registry: AgentRegistry,
    config: SystemConfig,
    invoker: Arc<ScriptedInvoker>,
) -> Orchestrator {
    init_test_logging();
    Orchestrator::new(config, registry, invoker)
}
