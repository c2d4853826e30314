use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use promptlink_common::{
    AgentDescriptor, ChatReply, CompatibilityReport, ReportFormat, ResultsView, RunRequest,
    SessionStatus, SessionSummary, StatusView, Strategy,
};

/// Client for the relay HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartedRun {
    pub session_id: String,
    pub status: SessionStatus,
    pub strategy: Strategy,
    pub stream_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentListing {
    pub agents: Vec<AgentDescriptor>,
    pub fallback: Vec<AgentDescriptor>,
    pub active_count: usize,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    agent_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct CompatibilityBody<'a> {
    agent_a: &'a str,
    agent_b: &'a str,
}

#[derive(Serialize)]
struct AggregateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct AggregateReply {
    report: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn start_run(&self, request: &RunRequest) -> Result<StartedRun> {
        let response = self
            .client
            .post(self.url("/api/relay/runs"))
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        parse_json(response).await
    }

    pub async fn list_runs(&self) -> Result<Vec<SessionSummary>> {
        self.get_json("/api/relay/runs").await
    }

    pub async fn status(&self, session_id: &str) -> Result<StatusView> {
        self.get_json(&format!("/api/relay/runs/{}/status", session_id)).await
    }

    pub async fn results(&self, session_id: &str) -> Result<ResultsView> {
        self.get_json(&format!("/api/relay/runs/{}/results", session_id)).await
    }

    pub async fn report(&self, session_id: &str, format: ReportFormat) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/api/relay/runs/{}/report", session_id)))
            .query(&[("format", format.to_string())])
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.text().await?)
    }

    pub async fn stop(&self, session_id: &str) -> Result<StatusView> {
        let response = self
            .client
            .post(self.url(&format!("/api/relay/runs/{}/stop", session_id)))
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn aggregate(&self, session_id: &str, model: Option<&str>) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("/api/relay/runs/{}/aggregate", session_id)))
            .json(&AggregateBody { model })
            .send()
            .await?;
        let reply: AggregateReply = parse_json(response).await?;
        Ok(reply.report)
    }

    pub async fn agents(&self) -> Result<AgentListing> {
        self.get_json("/api/agents").await
    }

    pub async fn chat(&self, agent_id: &str, message: &str, system: Option<&str>) -> Result<ChatReply> {
        let response = self
            .client
            .post(self.url("/api/agents/chat"))
            .json(&ChatBody {
                agent_id,
                message,
                system,
            })
            .send()
            .await?;
        parse_json(response).await
    }

    pub async fn compatibility(&self, agent_a: &str, agent_b: &str) -> Result<CompatibilityReport> {
        let response = self
            .client
            .post(self.url("/api/agents/compatibility"))
            .json(&CompatibilityBody { agent_a, agent_b })
            .send()
            .await?;
        parse_json(response).await
    }

    /// Poll the status endpoint until the session is terminal
    pub async fn wait_for_completion(
        &self,
        session_id: &str,
        interval: Duration,
        mut on_progress: impl FnMut(&StatusView),
    ) -> Result<StatusView> {
        let mut last_progress = None;
        loop {
            let status = self.status(session_id).await?;
            if last_progress != Some(status.progress) {
                on_progress(&status);
                last_progress = Some(status.progress);
            }
            if status.status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        parse_json(response).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check(response).await?;
    Ok(response.json().await?)
}

/// Turn non-success responses into errors carrying the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => anyhow::bail!(
            "API request failed ({} {}): {}",
            status.as_u16(),
            body.code.as_deref().unwrap_or_else(|| reason(status)),
            body.error
        ),
        Err(_) => anyhow::bail!("API request failed ({}): {}", status, text),
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("error")
}
