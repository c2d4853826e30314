//! Human-readable session reports

use promptlink_common::text::escape_html;
use promptlink_common::{AgentOutcome, RelayError, RelayResult, ReportFormat};

use crate::session::Session;

pub fn render(session: &Session, format: ReportFormat) -> RelayResult<String> {
    match format {
        ReportFormat::Html => render_html(session),
        ReportFormat::Markdown => render_markdown(session),
    }
}

fn ensure_results(session: &Session) -> RelayResult<()> {
    if session.results.is_empty() {
        return Err(RelayError::NoResults(format!(
            "session {} has no results yet",
            session.id
        )));
    }
    Ok(())
}

pub fn render_html(session: &Session) -> RelayResult<String> {
    ensure_results(session)?;

    let title = escape_html(session.strategy.report_title());
    let mut html = String::new();
    html.push_str(&format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n\
         body {{ font-family: sans-serif; max-width: 960px; margin: 2rem auto; }}\n\
         .result {{ border: 1px solid #ddd; border-radius: 6px; padding: 1rem; margin: 1rem 0; }}\n\
         .error {{ border-color: #e55; background: #fff3f3; }}\n\
         .cancelled {{ opacity: 0.7; }}\n\
         pre {{ white-space: pre-wrap; }}\n\
         </style>\n</head>\n<body>\n<h1>{title}</h1>\n",
    ));

    html.push_str(&format!(
        "<p><strong>Session:</strong> {}<br>\n<strong>Status:</strong> {}<br>\n\
         <strong>Strategy:</strong> {}<br>\n<strong>Progress:</strong> {}%</p>\n\
         <h2>Prompt</h2>\n<pre>{}</pre>\n",
        escape_html(session.id.as_str()),
        session.status,
        session.strategy,
        session.progress,
        escape_html(&session.prompt),
    ));

    if let Some(error) = &session.error {
        html.push_str(&format!(
            "<p class=\"error\"><strong>Run error:</strong> {}</p>\n",
            escape_html(error)
        ));
    }

    if let Some(report) = &session.report {
        html.push_str(&format!("<h2>Summary</h2>\n<pre>{}</pre>\n", escape_html(report)));
    } else if let Some(error) = &session.aggregation_error {
        html.push_str(&format!(
            "<p class=\"error\"><strong>Aggregation failed:</strong> {}</p>\n",
            escape_html(error)
        ));
    }

    html.push_str("<h2>Agent results</h2>\n");
    for outcome in &session.results {
        let mut classes = String::from("result");
        if !outcome.is_success() {
            classes.push_str(" error");
        }
        if outcome.cancelled {
            classes.push_str(" cancelled");
        }

        html.push_str(&format!(
            "<div class=\"{}\">\n<h3>{}{}</h3>\n<p><em>{}</em></p>\n",
            classes,
            escape_html(&outcome.agent_name),
            heading_suffix(outcome),
            escape_html(&outcome.model),
        ));
        match (&outcome.response, &outcome.error) {
            (Some(text), _) => html.push_str(&format!("<pre>{}</pre>\n", escape_html(text))),
            (None, error) => html.push_str(&format!(
                "<p><strong>Error:</strong> {}</p>\n",
                escape_html(error.as_deref().unwrap_or("unknown error"))
            )),
        }
        html.push_str("</div>\n");
    }

    html.push_str("</body>\n</html>\n");
    Ok(html)
}

pub fn render_markdown(session: &Session) -> RelayResult<String> {
    ensure_results(session)?;

    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", session.strategy.report_title()));
    md.push_str(&format!("- **Session:** {}\n", session.id));
    md.push_str(&format!("- **Status:** {}\n", session.status));
    md.push_str(&format!("- **Progress:** {}%\n\n", session.progress));
    md.push_str(&format!("## Prompt\n\n{}\n\n", session.prompt));

    if let Some(error) = &session.error {
        md.push_str(&format!("> **Run error:** {}\n\n", error));
    }
    if let Some(report) = &session.report {
        md.push_str(&format!("## Summary\n\n{}\n\n", report));
    } else if let Some(error) = &session.aggregation_error {
        md.push_str(&format!("> **Aggregation failed:** {}\n\n", error));
    }

    md.push_str("## Agent results\n\n");
    for outcome in &session.results {
        let cancelled = if outcome.cancelled { " _(cancelled)_" } else { "" };
        md.push_str(&format!(
            "### {}{} `{}`{}\n\n{}\n\n",
            outcome.agent_name,
            heading_suffix(outcome),
            outcome.model,
            cancelled,
            outcome.text_or_error()
        ));
    }
    Ok(md)
}

/// ` (round 2)` or ` (moderator opening)`, empty for plain turns
fn heading_suffix(outcome: &AgentOutcome) -> String {
    match (outcome.phase, outcome.round) {
        (Some(phase), _) => format!(" (moderator {})", phase),
        (None, Some(round)) => format!(" (round {})", round),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptlink_common::{AgentDescriptor, Strategy, TurnPhase};

    fn completed_session() -> Session {
        let mut session = Session::new("Is <script> safe?", Strategy::Panel, 2);
        session.start().unwrap();
        let a = AgentDescriptor::new("a", "Alpha & Co", "vendor/a");
        let b = AgentDescriptor::new("b", "Beta", "vendor/b");
        session.record_result(AgentOutcome::success(&a, "<b>no</b>")).unwrap();
        session.record_result(AgentOutcome::failure(&b, "HTTP 502")).unwrap();
        session.finish().unwrap();
        session
    }

    #[test]
    fn html_escapes_user_content() {
        let html = render_html(&completed_session()).unwrap();
        assert!(html.contains("Expert Panel Report"));
        assert!(html.contains("Is &lt;script&gt; safe?"));
        assert!(html.contains("Alpha &amp; Co"));
        assert!(html.contains("&lt;b&gt;no&lt;/b&gt;"));
        assert!(html.contains("class=\"result error\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn markdown_lists_errors() {
        let md = render(&completed_session(), ReportFormat::Markdown).unwrap();
        assert!(md.starts_with("# Expert Panel Report"));
        assert!(md.contains("[error: HTTP 502]"));
    }

    #[test]
    fn headings_mark_rounds_and_moderator_turns() {
        let mut session = Session::new("p", Strategy::Chain, 2);
        session.start().unwrap();
        let host = AgentDescriptor::new("h", "Host", "vendor/h");
        let a = AgentDescriptor::new("a", "Alpha", "vendor/a");
        session
            .record_result(AgentOutcome::success(&host, "welcome").with_phase(TurnPhase::Opening))
            .unwrap();
        session
            .record_result(AgentOutcome::success(&a, "point").with_round(2))
            .unwrap();
        session.finish().unwrap();

        let md = render_markdown(&session).unwrap();
        assert!(md.contains("### Host (moderator opening) `vendor/h`"));
        assert!(md.contains("### Alpha (round 2) `vendor/a`"));
    }

    #[test]
    fn empty_session_has_no_report() {
        let session = Session::new("p", Strategy::Chain, 1);
        assert!(matches!(render_html(&session), Err(RelayError::NoResults(_))));
    }
}
