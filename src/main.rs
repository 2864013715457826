//! parallel-research - command line entry point.
//!
//! Runs a research prompt, or inspects the task documents of earlier runs.

use clap::{Parser, Subcommand};
use parallel_research::store::parse_frontmatter;
use parallel_research::{Config, Orchestrator, RunOptions, TaskId, TaskStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parallel research CLI
#[derive(Parser, Debug)]
#[command(name = "parallel-research", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decompose a prompt, research every task in parallel and print the plan
    Run {
        /// The research request
        prompt: String,

        /// Try the browser collector before web search
        #[arg(long)]
        browser: bool,

        /// Gemini model for this run (overrides GEMINI_MODEL)
        #[arg(long)]
        model: Option<String>,
    },

    /// List persisted tasks with their status and title
    List,

    /// Print one task document
    Show {
        /// Task id
        id: TaskId,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parallel_research=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: tasks_dir={}, budget={:?}",
        config.tasks_dir.display(),
        config.task_time_budget
    );

    match cli.command {
        Command::Run {
            prompt,
            browser,
            model,
        } => {
            let orchestrator = Orchestrator::from_config(&config, model.as_deref())?;
            let result = orchestrator
                .run(&prompt, RunOptions::default().with_tier_one(browser))
                .await?;

            for (task, path) in result.tasks.iter().zip(&result.task_paths) {
                println!("## {} [{}]", task.title(), task.status());
                println!("Objective: {}", task.objective());
                println!("File: {}", path.display());
                println!();
            }
            println!("# Final Plan\n");
            println!("{}", result.final_summary);
        }
        Command::List => {
            let store = TaskStore::new(&config.tasks_dir)?;
            for path in store.list_paths()? {
                let content = std::fs::read_to_string(&path)?;
                let Some(front) = parse_frontmatter(&content) else {
                    warn!("Skipping unreadable task document {}", path.display());
                    continue;
                };
                let field = |key: &str| front.get(key).and_then(|v| v.as_str()).unwrap_or("?").to_string();
                println!("{}  {:<11}  {}", field("id"), field("status"), field("title"));
            }
        }
        Command::Show { id } => {
            let store = TaskStore::new(&config.tasks_dir)?;
            print!("{}", store.read_full_text(id)?);
        }
    }

    Ok(())
}
