use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{RelayError, RelayResult};
use crate::types::{AgentDescriptor, AgentProfile};

/// Configuration schema version understood by this build
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// OpenAI-compatible chat completion provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,
    #[serde(default = "default_rounds")]
    pub default_rounds: u32,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_aggregator_model")]
    pub aggregator_model: String,
    /// Per-agent characters handed to the aggregator
    #[serde(default = "default_snippet_chars")]
    pub aggregator_snippet_chars: usize,
    #[serde(default)]
    pub aggregate_by_default: bool,
    /// Chain transcript budget in characters, 0 keeps everything
    #[serde(default)]
    pub max_transcript_chars: usize,
    /// Terminal sessions older than this are swept from the store
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_chain_system")]
    pub chain_system: String,
    #[serde(default = "default_pairs_system")]
    pub pairs_system: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Remote listing of agents consulted for the active set
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Replaces the built-in fallback set when non-empty
    #[serde(default)]
    pub fallback: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub model: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub profile: Option<AgentProfile>,
}

impl From<&AgentConfig> for AgentDescriptor {
    fn from(config: &AgentConfig) -> Self {
        AgentDescriptor {
            id: config.id.clone(),
            name: config.name.clone(),
            model: config.model.clone(),
            active: config.active,
            group: config.group.clone(),
            notes: config.notes.clone(),
            profile: config.profile.clone(),
        }
    }
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_max_pairs() -> usize {
    10
}

fn default_rounds() -> u32 {
    3
}

fn default_max_rounds() -> u32 {
    10
}

fn default_aggregator_model() -> String {
    "openai/gpt-5".to_string()
}

fn default_snippet_chars() -> usize {
    900
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_chain_system() -> String {
    "You are part of a relay; be precise and cite assumptions.".to_string()
}

fn default_pairs_system() -> String {
    "Be rigorous, cite assumptions, keep responses tight.".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            referer: None,
            title: None,
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_pairs: default_max_pairs(),
            default_rounds: default_rounds(),
            max_rounds: default_max_rounds(),
            aggregator_model: default_aggregator_model(),
            aggregator_snippet_chars: default_snippet_chars(),
            aggregate_by_default: false,
            max_transcript_chars: 0,
            session_ttl_secs: default_session_ttl_secs(),
            chain_system: default_chain_system(),
            pairs_system: default_pairs_system(),
        }
    }
}

impl OrchestrationConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            catalog_url: None,
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fallback: Vec::new(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            orchestration: OrchestrationConfig::default(),
            registry: RegistryConfig::default(),
            agents: Vec::new(),
        }
    }
}

impl SystemConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> RelayResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> RelayResult<Self> {
        let config: SystemConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.version != CONFIG_VERSION {
            return Err(RelayError::ConfigValidation {
                details: format!(
                    "unsupported config version {} (expected {})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.provider.base_url.trim().is_empty() {
            return Err(RelayError::ConfigValidation {
                details: "provider.base_url must not be empty".to_string(),
            });
        }

        if self.orchestration.max_concurrency == 0 {
            return Err(RelayError::ConfigValidation {
                details: "orchestration.max_concurrency must be at least 1".to_string(),
            });
        }

        if self.orchestration.max_rounds == 0 || self.orchestration.default_rounds == 0 {
            return Err(RelayError::ConfigValidation {
                details: "orchestration rounds must be at least 1".to_string(),
            });
        }

        for (table, agents) in [("agents", &self.agents), ("registry.fallback", &self.registry.fallback)] {
            let mut seen = HashSet::new();
            for agent in agents {
                if agent.id.trim().is_empty() || agent.model.trim().is_empty() {
                    return Err(RelayError::ConfigValidation {
                        details: format!("{} entries need a non-empty id and model", table),
                    });
                }
                if !seen.insert(agent.id.as_str()) {
                    return Err(RelayError::ConfigValidation {
                        details: format!("duplicate agent id '{}' in {}", agent.id, table),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn agent_descriptors(&self) -> Vec<AgentDescriptor> {
        self.agents.iter().map(AgentDescriptor::from).collect()
    }

    pub fn active_agent_count(&self) -> usize {
        self.agents.iter().filter(|a| a.active).count()
    }
}
