//! Plain-text rendering of API responses for the terminal

use promptlink_common::{
    AgentDescriptor, CompatibilityReport, ResultsView, SessionSummary, StatusView,
};

use crate::api_client::AgentListing;

pub fn format_status(status: &StatusView) -> String {
    let mut line = format!(
        "{} [{}] {} {}%",
        status.session_id, status.strategy, status.status, status.progress
    );
    if status.stop_requested {
        line.push_str(" (stop requested)");
    }
    line
}

pub fn format_results(view: &ResultsView) -> String {
    let mut out = format!(
        "Session {} ({}, {}): {} result(s)\n",
        view.session_id,
        view.strategy,
        view.status,
        view.results.len()
    );
    if let Some(error) = &view.error {
        out.push_str(&format!("Run error: {}\n", error));
    }

    for outcome in &view.results {
        let label = match (outcome.phase, outcome.round) {
            (Some(phase), _) => format!(" moderator {}", phase),
            (None, Some(round)) => format!(" round {}", round),
            (None, None) => String::new(),
        };
        out.push_str(&format!(
            "\n── {} ({}){} ──\n{}\n",
            outcome.agent_name,
            outcome.model,
            label,
            outcome.text_or_error()
        ));
    }

    match (&view.report, &view.aggregation_error) {
        (Some(report), _) => out.push_str(&format!("\n══ Summary ══\n{}\n", report)),
        (None, Some(error)) => out.push_str(&format!("\nAggregation failed: {}\n", error)),
        (None, None) => {}
    }
    out
}

pub fn format_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No sessions".to_string();
    }
    sessions
        .iter()
        .map(|s| {
            format!(
                "{}  {:<6} {:<9} {:>3}%  {:>2} result(s)  {}",
                s.session_id, s.strategy, s.status, s.progress, s.result_count, s.prompt_preview
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn agent_line(agent: &AgentDescriptor) -> String {
    let mut line = format!("  {:<18} {:<24} {}", agent.id, agent.name, agent.model);
    if !agent.active {
        line.push_str("  [inactive]");
    }
    if let Some(group) = &agent.group {
        line.push_str(&format!("  ({})", group));
    }
    line
}

pub fn format_compatibility(report: &CompatibilityReport) -> String {
    let verdict = if report.recommended {
        "Highly recommended"
    } else {
        "Consider alternatives"
    };
    let mut out = format!(
        "{} + {}: {}/100 ({}) - {}",
        report.agent_a, report.agent_b, report.score, report.level, verdict
    );
    for factor in &report.factors {
        out.push_str(&format!("\n  - {}", factor));
    }
    out
}

pub fn format_agents(listing: &AgentListing) -> String {
    let mut out = format!("Agents ({} active):\n", listing.active_count);
    for agent in &listing.agents {
        out.push_str(&agent_line(agent));
        out.push('\n');
    }
    out.push_str("Fallback:\n");
    for agent in &listing.fallback {
        out.push_str(&agent_line(agent));
        out.push('\n');
    }
    out
}
