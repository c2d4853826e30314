//! Start a run, follow it to completion and print the outcome

use std::time::Duration;

use anyhow::Result;

use promptlink_common::{ReportFormat, RunRequest, Strategy};

use crate::api_client::ApiClient;
use crate::display;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Run parameters collected from the command line or the REPL
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub strategy: Strategy,
    pub agents: Vec<String>,
    /// `a:b` specs for pairs runs
    pub pairs: Vec<String>,
    pub rounds: Option<u32>,
    pub concurrency: Option<usize>,
    pub system: Option<String>,
    pub aggregate: bool,
    pub aggregator_model: Option<String>,
    /// Moderator agent for chain runs
    pub moderator: Option<String>,
    /// Print the rendered report instead of raw results
    pub report: Option<ReportFormat>,
    /// Return right after the run is accepted
    pub detach: bool,
}

impl RunOptions {
    pub fn to_request(&self, prompt: &str) -> Result<RunRequest> {
        let mut request = RunRequest::new(prompt, self.strategy);
        if !self.agents.is_empty() {
            request.agents = Some(self.agents.clone());
        }
        if !self.pairs.is_empty() {
            request.pairs = Some(
                self.pairs
                    .iter()
                    .map(|spec| parse_pair(spec))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        request.rounds = self.rounds;
        request.concurrency = self.concurrency;
        request.system = self.system.clone();
        request.moderator = self.moderator.clone();
        if self.aggregate {
            request.aggregate = Some(true);
            request.aggregator_model = self.aggregator_model.clone();
        }
        Ok(request)
    }
}

/// Parse `alpha:beta` into a two-agent pair
pub fn parse_pair(spec: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = spec
        .split(|c: char| c == ':' || c == ',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    if ids.len() != 2 {
        anyhow::bail!("pair '{}' must name exactly two agents, e.g. alpha:beta", spec);
    }
    Ok(ids)
}

pub async fn execute(client: &ApiClient, prompt: &str, options: &RunOptions) -> Result<()> {
    let request = options.to_request(prompt)?;
    let started = client.start_run(&request).await?;
    println!("Started {} run {}", started.strategy, started.session_id);

    if options.detach {
        println!("Stream: {}{}", client.base_url(), started.stream_url);
        return Ok(());
    }

    let status = client
        .wait_for_completion(&started.session_id, POLL_INTERVAL, |s| {
            eprintln!("  {}", display::format_status(s))
        })
        .await?;

    // Aggregation finishes after the terminal status; wait for it briefly
    let mut results = client.results(&started.session_id).await?;
    if options.aggregate && status.status.is_terminal() {
        for _ in 0..120 {
            if results.report.is_some() || results.aggregation_error.is_some() || results.error.is_some() {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            results = client.results(&started.session_id).await?;
        }
    }

    match options.report {
        Some(format) => println!("{}", client.report(&started.session_id, format).await?),
        None => println!("{}", display::format_results(&results)),
    }
    Ok(())
}
