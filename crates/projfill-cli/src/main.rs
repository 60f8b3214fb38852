mod display;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use projfill_core::config::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, DEFAULT_ROOTDATA_BASE_URL,
};
use projfill_core::{CandidateEdits, MergedCandidate, Settings};
use projfill_host::Pipeline;
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "projfill", version, about = "Research, reconcile and submit on-chain project records")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL, global = true)]
    openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    openai_base_url: String,

    #[arg(long, env = "ROOTDATA_API_KEY", hide_env_values = true, global = true)]
    rootdata_api_key: Option<String>,

    #[arg(long, env = "ROOTDATA_BASE_URL", default_value = DEFAULT_ROOTDATA_BASE_URL, global = true)]
    rootdata_base_url: String,

    #[arg(long, env = "PENSIEVE_BASE_URL", global = true)]
    pensieve_base_url: Option<String>,

    #[arg(long, env = "PENSIEVE_SYSTEM_TOKEN", hide_env_values = true, global = true)]
    pensieve_system_token: Option<String>,

    /// Timeout for provider and registry calls, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30, global = true)]
    request_timeout_secs: u64,

    /// Upper bound on a single AI extraction, in seconds.
    #[arg(long, env = "EXTRACTION_TIMEOUT_SECS", default_value_t = 120, global = true)]
    extraction_timeout_secs: u64,
}

impl ConfigArgs {
    fn into_settings(self) -> Settings {
        Settings {
            openai_api_key: self.openai_api_key,
            openai_model: self.openai_model,
            openai_base_url: self.openai_base_url,
            rootdata_api_key: self.rootdata_api_key,
            rootdata_base_url: self.rootdata_base_url,
            pensieve_base_url: self.pensieve_base_url,
            pensieve_system_token: self.pensieve_system_token,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            extraction_timeout: Duration::from_secs(self.extraction_timeout_secs),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,
    },
    /// Search RootData by keyword.
    Search { query: String },
    /// Fetch, extract and reconcile one project into a candidate.
    Fill {
        project_id: u64,
        /// Print the candidate as JSON instead of a card.
        #[arg(long)]
        json: bool,
    },
    /// Ask Pensieve whether a project name is taken.
    CheckName { name: String },
    /// Validate edits against a candidate and submit to Pensieve.
    Submit {
        /// JSON file with the edited fields.
        edits: PathBuf,
        /// JSON file with the candidate produced by `fill --json`.
        #[arg(long)]
        candidate: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("projfill v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = Pipeline::from_settings(cli.config.into_settings())
        .context("failed to initialise pipeline")?;

    match cli.command {
        Command::Serve { bind } => {
            projfill_host::serve(bind, Arc::new(pipeline))
                .await
                .with_context(|| format!("server on {bind} failed"))?;
        }
        Command::Search { query } => {
            let hits = pipeline.search(&query).await?;
            display::print_search_hits(&hits);
        }
        Command::Fill { project_id, json } => {
            let candidate = pipeline.fill(project_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&candidate)?);
            } else {
                display::print_candidate_card(&candidate);
            }
        }
        Command::CheckName { name } => {
            let exists = pipeline.check_name(&name).await?;
            println!("{}", if exists { "taken" } else { "available" });
        }
        Command::Submit { edits, candidate } => {
            let edits: CandidateEdits = read_json(&edits)?;
            let candidate: MergedCandidate = match candidate {
                Some(path) => read_json(&path)?,
                None => MergedCandidate::default(),
            };
            let created = pipeline
                .submit_with_cancel(&edits, &candidate, interrupted())
                .await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Resolves on Ctrl-C. Never resolves if the signal handler is unavailable.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
