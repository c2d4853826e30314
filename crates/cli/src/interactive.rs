//! Line-oriented REPL over the relay API

use anyhow::Result;
use rustyline::{error::ReadlineError, DefaultEditor};

use promptlink_common::Strategy;

use crate::api_client::ApiClient;
use crate::display;
use crate::oneshot::{self, RunOptions};

const HELP: &str = "\
Commands:
  <prompt>                run the prompt with the current settings
  /strategy panel|pairs|chain
  /agents a,b,c           select agents (empty to use the active set)
  /pairs a:b c:d          select pairs for pairs runs
  /rounds N
  /aggregate on|off
  /moderator <agent>      moderate chain runs (empty to clear)
  /compat <a> <b>         score two agents as a pair
  /chat <agent> <message> talk to a single agent
  /list                   list sessions
  /registry               list agents
  /help
  exit";

pub async fn run(client: &ApiClient) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut options = RunOptions::default();

    println!("PromptLink - Interactive Mode ({})", client.base_url());
    println!("Type a prompt, or /help for commands");

    loop {
        let prompt = format!("{}> ", options.strategy);
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        let _ = rl.add_history_entry(line);

        if let Err(e) = handle_line(client, &mut options, line).await {
            eprintln!("error: {:#}", e);
        }
    }

    Ok(())
}

async fn handle_line(client: &ApiClient, options: &mut RunOptions, line: &str) -> Result<()> {
    let Some(command) = line.strip_prefix('/') else {
        return oneshot::execute(client, line, options).await;
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "help" => println!("{}", HELP),
        "strategy" => {
            options.strategy = rest
                .parse::<Strategy>()
                .map_err(|_| anyhow::anyhow!("unknown strategy '{}'", rest))?;
        }
        "agents" => {
            options.agents = rest
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }
        "pairs" => {
            for spec in rest.split_whitespace() {
                oneshot::parse_pair(spec)?;
            }
            options.pairs = rest.split_whitespace().map(str::to_string).collect();
        }
        "rounds" => options.rounds = Some(rest.parse()?),
        "aggregate" => options.aggregate = matches!(rest, "on" | "true" | "yes"),
        "moderator" => options.moderator = Some(rest.to_string()).filter(|id| !id.is_empty()),
        "compat" => {
            let (a, b) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow::anyhow!("usage: /compat <agent> <agent>"))?;
            let report = client.compatibility(a.trim(), b.trim()).await?;
            println!("{}", display::format_compatibility(&report));
        }
        "chat" => {
            let (agent, message) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow::anyhow!("usage: /chat <agent> <message>"))?;
            let reply = client.chat(agent, message, None).await?;
            println!("[{}] {}", reply.agent_name, reply.response);
        }
        "list" => println!("{}", display::format_sessions(&client.list_runs().await?)),
        "registry" => print!("{}", display::format_agents(&client.agents().await?)),
        other => anyhow::bail!("unknown command '/{}', try /help", other),
    }
    Ok(())
}
