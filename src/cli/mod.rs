//! CLI commands for orchd using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{load_settings, load_settings_from, Settings};
use crate::hardware::{select_model_tier, HardwareProfiler};
use crate::indexing::{index_project, ProjectCrawler};
use crate::providers::{create_backend, load_model, stop_model};
use crate::web::{run_server, AppState, WebServerConfig};

/// orchd - local, hardware-aware code assistant daemon.
#[derive(Parser)]
#[command(name = "orchd")]
#[command(version)]
#[command(about = "Index a project, retrieve context and route tasks to local models", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.orchd/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ollama base URL
    #[arg(long, global = true, env = "ORCHD_OLLAMA_URL")]
    pub ollama_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP daemon
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "ORCHD_PORT")]
        port: Option<u16>,
    },

    /// Print the hardware profile
    Hardware,

    /// Print the recommended model tier
    Recommend,

    /// Index a project in the foreground
    Index {
        /// Project root
        path: PathBuf,
    },

    /// Query the index for similar chunks
    Query {
        text: String,

        /// Number of results
        #[arg(short = 'k', long, default_value_t = 5)]
        k: usize,
    },

    /// Route a task to an agent
    Task { text: String },

    /// List installed models
    Models,

    /// Download a model
    Pull { model: String },

    /// Load a model and keep it resident
    Load { model: String },

    /// Unload a model
    Stop { model: String },
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;
        match &self.command {
            Command::Serve { port } => cmd_serve(settings, *port).await,
            Command::Hardware => cmd_hardware(),
            Command::Recommend => cmd_recommend(),
            Command::Index { path } => cmd_index(settings, path).await,
            Command::Query { text, k } => cmd_query(settings, text, *k).await,
            Command::Task { text } => cmd_task(settings, text).await,
            Command::Models => cmd_models(&settings).await,
            Command::Pull { model } => cmd_pull(&settings, model).await,
            Command::Load { model } => cmd_load(&settings, model).await,
            Command::Stop { model } => cmd_stop(&settings, model).await,
        }
    }

    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => load_settings_from(path)?,
            None => load_settings()?,
        };
        if let Some(url) = &self.ollama_url {
            settings.backend.base_url = url.clone();
        }
        Ok(settings)
    }
}

// Command implementations

async fn cmd_serve(settings: Settings, port: Option<u16>) -> Result<()> {
    let config = WebServerConfig {
        host: settings.server.host.clone(),
        port: port.unwrap_or(settings.server.port),
    };
    let state = Arc::new(AppState::from_settings(settings)?);
    run_server(config, state).await
}

fn cmd_hardware() -> Result<()> {
    let profile = HardwareProfiler::new().profile();
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn cmd_recommend() -> Result<()> {
    let recommendation = select_model_tier(&HardwareProfiler::new().profile());
    println!("Tier:      {} ({})", recommendation.tier, recommendation.tier.label());
    println!("Model:     {}", recommendation.suggested_model);
    println!("Peak mem:  {:.1} GB", recommendation.max_memory_usage_gb);
    println!("Reasoning: {}", recommendation.reasoning);
    Ok(())
}

async fn cmd_index(settings: Settings, path: &std::path::Path) -> Result<()> {
    let batch_size = settings.indexing.batch_size;
    let state = AppState::from_settings(settings)?;
    let crawler = ProjectCrawler::new(path)?;

    println!("Indexing {}...", crawler.root().display());
    let summary = index_project(&crawler, state.store.as_ref(), batch_size, |s| {
        tracing::debug!("{} chunks from {} files", s.chunks_upserted, s.files_seen);
    })
    .await?;

    println!(
        "Indexed {} chunks from {} files.",
        summary.chunks_upserted, summary.files_seen
    );
    Ok(())
}

async fn cmd_query(settings: Settings, text: &str, k: usize) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    let matches = state.store.query(text, k).await?;

    if matches.is_empty() {
        println!("No matches. Has the project been indexed?");
        return Ok(());
    }
    for m in matches {
        println!(
            "{}:{}-{}  (distance {:.4})",
            m.metadata.filepath, m.metadata.start_line, m.metadata.end_line, m.distance
        );
    }
    Ok(())
}

async fn cmd_task(settings: Settings, text: &str) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    let response = state.coordinator.route(text).await;

    match &response.metadata {
        Some(meta) => println!("[{} / {} / {}]\n", response.agent_name, meta.kind, meta.model),
        None => println!("[{}]\n", response.agent_name),
    }
    println!("{}", response.content);
    Ok(())
}

async fn cmd_models(settings: &Settings) -> Result<()> {
    let backend = create_backend(settings);
    if !backend.is_running().await {
        anyhow::bail!("{} is not running at {}", backend.name(), settings.backend.base_url);
    }

    let models = backend.list_models().await?;
    if models.is_empty() {
        println!("No models installed.");
    }
    for m in models {
        println!("{:<32} {:>8.2} GB", m.name, m.size_gb);
    }
    Ok(())
}

async fn cmd_pull(settings: &Settings, model: &str) -> Result<()> {
    println!("Pulling {}...", model);
    create_backend(settings).pull(model).await?;
    println!("Pulled {}.", model);
    Ok(())
}

async fn cmd_load(settings: &Settings, model: &str) -> Result<()> {
    load_model(create_backend(settings).as_ref(), model).await?;
    println!("Loaded {}.", model);
    Ok(())
}

async fn cmd_stop(settings: &Settings, model: &str) -> Result<()> {
    stop_model(create_backend(settings).as_ref(), model).await?;
    println!("Stopped {}.", model);
    Ok(())
}
