use clap::{CommandFactory, Parser, Subcommand};

use promptlink_cli::{api_client::ApiClient, completions, display, interactive, oneshot};
use promptlink_common::{ReportFormat, Strategy};

#[derive(Parser)]
#[command(name = "promptlink")]
#[command(version)]
#[command(about = "Send one prompt to many models")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Relay server base URL
    #[arg(long, env = "PROMPTLINK_SERVER", default_value = "http://localhost:5000", global = true)]
    server: String,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt to run as a panel (one-shot mode)
    prompt: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run and wait for its results
    Run {
        prompt: String,

        /// panel, pairs or chain
        #[arg(short, long, default_value = "panel")]
        strategy: Strategy,

        /// Agent ids, comma separated; the active set when omitted
        #[arg(short, long, value_delimiter = ',')]
        agents: Vec<String>,

        /// Agent pair for pairs runs, e.g. alpha:beta (repeatable)
        #[arg(short, long = "pair")]
        pairs: Vec<String>,

        #[arg(short, long)]
        rounds: Option<u32>,

        #[arg(long)]
        concurrency: Option<usize>,

        /// System instruction for every call
        #[arg(long)]
        system: Option<String>,

        /// Summarize the results with the aggregator
        #[arg(long)]
        aggregate: bool,

        #[arg(long)]
        aggregator_model: Option<String>,

        /// Agent that opens and closes a chain run
        #[arg(long)]
        moderator: Option<String>,

        /// Print the rendered report (html or markdown) instead of raw results
        #[arg(long)]
        report: Option<ReportFormat>,

        /// Print the session id and return without waiting
        #[arg(long)]
        detach: bool,
    },
    /// List sessions
    Runs,
    /// Show a session's status
    Status { session_id: String },
    /// Show a session's results
    Results { session_id: String },
    /// Print a session's report
    Report {
        session_id: String,

        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,
    },
    /// Request a stop
    Stop { session_id: String },
    /// Summarize a completed session
    Aggregate {
        session_id: String,

        #[arg(long)]
        model: Option<String>,
    },
    /// List configured agents
    Agents,
    /// Talk to a single agent
    Chat {
        agent_id: String,
        message: String,

        #[arg(long)]
        system: Option<String>,
    },
    /// Score two agents as a debate pair
    Compat { agent_a: String, agent_b: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.server);

    match cli.command {
        Some(Commands::Run {
            prompt,
            strategy,
            agents,
            pairs,
            rounds,
            concurrency,
            system,
            aggregate,
            aggregator_model,
            moderator,
            report,
            detach,
        }) => {
            let options = oneshot::RunOptions {
                strategy,
                agents,
                pairs,
                rounds,
                concurrency,
                system,
                aggregate,
                aggregator_model,
                moderator,
                report,
                detach,
            };
            oneshot::execute(&client, &prompt, &options).await?;
        }
        Some(Commands::Runs) => println!("{}", display::format_sessions(&client.list_runs().await?)),
        Some(Commands::Status { session_id }) => {
            println!("{}", display::format_status(&client.status(&session_id).await?))
        }
        Some(Commands::Results { session_id }) => {
            println!("{}", display::format_results(&client.results(&session_id).await?))
        }
        Some(Commands::Report { session_id, format }) => {
            println!("{}", client.report(&session_id, format).await?)
        }
        Some(Commands::Stop { session_id }) => {
            println!("{}", display::format_status(&client.stop(&session_id).await?))
        }
        Some(Commands::Aggregate { session_id, model }) => {
            println!("{}", client.aggregate(&session_id, model.as_deref()).await?)
        }
        Some(Commands::Agents) => print!("{}", display::format_agents(&client.agents().await?)),
        Some(Commands::Chat {
            agent_id,
            message,
            system,
        }) => {
            let reply = client.chat(&agent_id, &message, system.as_deref()).await?;
            println!("[{}] {}", reply.agent_name, reply.response);
        }
        Some(Commands::Compat { agent_a, agent_b }) => {
            println!(
                "{}",
                display::format_compatibility(&client.compatibility(&agent_a, &agent_b).await?)
            )
        }
        Some(Commands::Completions { shell }) => {
            completions::generate(shell, &mut Cli::command());
        }
        None => match cli.prompt {
            Some(prompt) => oneshot::execute(&client, &prompt, &oneshot::RunOptions::default()).await?,
            None => interactive::run(&client).await?,
        },
    }

    Ok(())
}
