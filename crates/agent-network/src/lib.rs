//! PromptLink network: multi-agent orchestration core
//!
//! This crate fans a prompt out to remote language models and collects
//! their replies:
//! - Model invocation behind the [`ModelInvoker`] trait
//! - Agent registry with a remote catalog and a fallback set
//! - Session state machine with live status streaming
//! - Panel, pairs and chain run strategies
//! - Aggregation into a single report and HTML/Markdown rendering

pub mod agents;
pub mod aggregator;
pub mod compatibility;
pub mod llm;
pub mod orchestrator;
pub mod report;
pub mod runners;
pub mod session;
pub mod session_store;
pub mod status_stream;

// Re-exports
pub use agents::{default_fallback_agents, AgentRegistry, RemoteCatalog};
pub use aggregator::Aggregator;
pub use compatibility::compatibility;
pub use llm::{InvocationOptions, ModelInvoker, OpenRouterClient};
pub use orchestrator::Orchestrator;
pub use runners::{RunContext, RunPlan};
pub use session::{Session, SessionHandle};
pub use session_store::SessionStore;
pub use status_stream::StatusStream;
