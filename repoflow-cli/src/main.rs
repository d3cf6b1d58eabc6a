//! Repoflow CLI: list uploaded repositories, run the pipeline, revert changes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use repoflow::config::RepoflowConfig;
use repoflow::events::LoggingEventSink;
use repoflow::observability::{init_logging, LogFormat};
use repoflow::pipeline::Orchestrator;
use repoflow::repository::{list_repositories, resolve_repository};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "repoflow")]
#[command(about = "Analyze repositories and apply reversible, prompt-driven code changes")]
struct Cli {
    /// Directory holding uploaded repositories (overrides REPOFLOW_UPLOADS_DIR)
    #[arg(long, global = true)]
    uploads_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "compact")]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Compact => Self::Compact,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List repositories in the uploads directory
    List,

    /// Run the pipeline on a repository
    Run {
        /// Repository name (under the uploads directory) or path
        #[arg(long)]
        repo: String,

        /// Natural-language request; without it only analysis runs
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Restore files from their backups
    Revert {
        /// Repository name (under the uploads directory) or path
        #[arg(long)]
        repo: String,

        /// Repository-relative paths to restore
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn orchestrator(config: &RepoflowConfig) -> Result<Orchestrator> {
    Ok(Orchestrator::from_config(config)
        .context("building reasoning client")?
        .with_event_sink(Arc::new(LoggingEventSink::debug())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    let mut config = RepoflowConfig::from_env().context("loading configuration")?;
    if let Some(dir) = cli.uploads_dir {
        config.uploads_dir = dir;
    }

    match cli.command {
        Commands::List => {
            let names = list_repositories(&config.uploads_dir)?;
            print_json(&serde_json::json!({ "repositories": names }))?;
        }
        Commands::Run { repo, prompt } => {
            let root = resolve_repository(&config.uploads_dir, &repo)?;
            info!(repository = %root.display(), has_prompt = prompt.is_some(), "running pipeline");

            let response = orchestrator(&config)?.run(&root, prompt.as_deref()).await?;
            print_json(&response)?;
        }
        Commands::Revert { repo, paths } => {
            let root = resolve_repository(&config.uploads_dir, &repo)?;
            info!(repository = %root.display(), files = paths.len(), "reverting files");

            let report = orchestrator(&config)?.revert(&root, paths).await?;
            print_json(&report)?;
            report.into_result()?;
        }
    }

    Ok(())
}
