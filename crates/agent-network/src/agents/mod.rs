//! Agent registry: resolves agent ids to model endpoints

pub mod catalog;

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use promptlink_common::{AgentDescriptor, RelayError, RelayResult, SystemConfig};

pub use catalog::RemoteCatalog;

/// Known-good agents used whenever the primary source yields nothing usable
pub fn default_fallback_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new("gpt-4o", "GPT-4o", "openai/gpt-4o"),
        AgentDescriptor::new("claude-3.5", "Claude 3.5 Sonnet", "anthropic/claude-3.5-sonnet"),
        AgentDescriptor::new("deepseek-r1", "DeepSeek R1", "deepseek/deepseek-r1"),
    ]
}

/// Registry of agent descriptors.
///
/// Lookups search the last successful catalog listing, then the static
/// table, then the fallback set.
pub struct AgentRegistry {
    agents: Vec<AgentDescriptor>,
    fallback: Vec<AgentDescriptor>,
    catalog: Option<RemoteCatalog>,
    discovered: RwLock<Vec<AgentDescriptor>>,
}

impl AgentRegistry {
    /// Build from static descriptors; the default fallback set is used
    pub fn new(agents: Vec<AgentDescriptor>) -> RelayResult<Self> {
        Self::with_fallback(agents, default_fallback_agents())
    }

    pub fn with_fallback(
        agents: Vec<AgentDescriptor>,
        fallback: Vec<AgentDescriptor>,
    ) -> RelayResult<Self> {
        ensure_unique(&agents)?;
        ensure_unique(&fallback)?;
        Ok(Self {
            agents,
            fallback,
            catalog: None,
            discovered: RwLock::new(Vec::new()),
        })
    }

    pub fn from_config(config: &SystemConfig) -> RelayResult<Self> {
        let fallback = if config.registry.fallback.is_empty() {
            default_fallback_agents()
        } else {
            config.registry.fallback.iter().map(AgentDescriptor::from).collect()
        };

        let mut registry = Self::with_fallback(config.agent_descriptors(), fallback)?;
        if let Some(url) = &config.registry.catalog_url {
            registry.catalog = Some(RemoteCatalog::new(
                url.clone(),
                std::time::Duration::from_secs(config.registry.fetch_timeout_secs),
            ));
        }

        info!(
            agents = registry.agents.len(),
            fallback = registry.fallback.len(),
            remote_catalog = registry.catalog.is_some(),
            "Agent registry loaded"
        );
        Ok(registry)
    }

    pub fn with_catalog(mut self, catalog: RemoteCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Active agents from the primary source.
    ///
    /// Never fails: an unreachable catalog or an empty active set yields the
    /// fallback agents instead.
    pub async fn active_agents(&self) -> Vec<AgentDescriptor> {
        let primary = match &self.catalog {
            Some(catalog) => match self.fetch_catalog(catalog).await {
                Some(agents) => agents,
                None => return self.fallback.clone(),
            },
            None => self.agents.clone(),
        };

        let active: Vec<AgentDescriptor> = primary.into_iter().filter(|a| a.active).collect();
        if active.is_empty() {
            warn!("No active agents configured, using fallback set");
            return self.fallback.clone();
        }
        active
    }

    /// Re-read the remote catalog. Returns false without a catalog or on failure.
    pub async fn refresh(&self) -> bool {
        match &self.catalog {
            Some(catalog) => self.fetch_catalog(catalog).await.is_some(),
            None => false,
        }
    }

    async fn fetch_catalog(&self, catalog: &RemoteCatalog) -> Option<Vec<AgentDescriptor>> {
        match catalog.fetch().await {
            Ok(agents) => {
                debug!(url = %catalog.url(), count = agents.len(), "Agent catalog fetched");
                *self.discovered.write().unwrap_or_else(PoisonError::into_inner) = agents.clone();
                Some(agents)
            }
            Err(e) => {
                warn!(url = %catalog.url(), "Agent catalog unavailable, using fallback: {}", e);
                None
            }
        }
    }

    /// Look up an agent by id in the catalog listing, the static table and
    /// then the fallback set.
    ///
    /// Inactive agents still resolve; explicit selection overrides the flag.
    pub fn resolve(&self, id: &str) -> RelayResult<AgentDescriptor> {
        let discovered = self.discovered.read().unwrap_or_else(PoisonError::into_inner);
        discovered
            .iter()
            .chain(self.agents.iter())
            .chain(self.fallback.iter())
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| RelayError::agent_not_found(id))
    }

    /// Like [`resolve`](Self::resolve), re-reading the catalog once on a miss
    pub async fn lookup(&self, id: &str) -> RelayResult<AgentDescriptor> {
        match self.resolve(id) {
            Err(RelayError::NotFound { .. }) if self.catalog.is_some() => {
                self.refresh().await;
                self.resolve(id)
            }
            found => found,
        }
    }

    /// Catalog agents followed by static agents the catalog does not shadow
    pub fn all_agents(&self) -> Vec<AgentDescriptor> {
        let discovered = self.discovered.read().unwrap_or_else(PoisonError::into_inner);
        let mut agents = discovered.clone();
        agents.extend(
            self.agents
                .iter()
                .filter(|a| !discovered.iter().any(|d| d.id == a.id))
                .cloned(),
        );
        agents
    }

    pub fn fallback_agents(&self) -> &[AgentDescriptor] {
        &self.fallback
    }
}

fn ensure_unique(agents: &[AgentDescriptor]) -> RelayResult<()> {
    let mut seen = HashSet::new();
    for agent in agents {
        if !seen.insert(agent.id.as_str()) {
            return Err(RelayError::ConfigValidation {
                details: format!("duplicate agent id '{}'", agent.id),
            });
        }
    }
    Ok(())
}
