//! Remote agent catalog
//!
//! Expected payload: `{"agents": {"<id>": {"name", "model", "active", ...}}}`.
//! Entries come back sorted by id.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use promptlink_common::{AgentDescriptor, AgentProfile};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct CatalogPayload {
    #[serde(default)]
    agents: BTreeMap<String, CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    name: Option<String>,
    model: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    profile: Option<AgentProfile>,
}

pub struct RemoteCatalog {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteCatalog {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        let response = self.http.get(&self.url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        let payload: CatalogPayload = response.json().await?;

        Ok(payload
            .agents
            .into_iter()
            .map(|(id, entry)| AgentDescriptor {
                name: entry.name.unwrap_or_else(|| id.clone()),
                id,
                model: entry.model,
                active: entry.active,
                group: entry.group,
                notes: entry.notes,
                profile: entry.profile,
            })
            .collect())
    }
}
