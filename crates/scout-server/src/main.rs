//! scout - multi-agent research chat server

mod api;
mod config;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use scout_agent::{AgentContext, MemoryCheckpointStore, Workflow};
use scout_ai::StreamOptions;
use scout_ai::providers::RetryConfig;
use scout_ai::providers::openai::OpenAIProvider;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::Config;

/// scout - research and chat agents behind an HTTP API
#[derive(Parser, Debug)]
#[command(name = "scout")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/scout/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API (default)
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single turn and print the outcome as JSON
    Chat {
        message: String,

        #[arg(long, default_value = "cli")]
        conversation_id: String,

        #[arg(long, default_value = "default")]
        user_id: String,
    },

    /// Print an example config file
    ExampleConfig,
}

fn init_tracing(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("scout=debug,scout_agent=debug,scout_ai=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()))
    };

    if config.debug {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    }
}

fn build_context(config: &Config) -> anyhow::Result<AgentContext> {
    let (model, api_key) = config.llm.model_and_key()?;
    tracing::info!(
        provider = model.provider.name(),
        model = %model.id,
        "Using LLM"
    );

    let options = StreamOptions {
        max_tokens: Some(config.llm.max_tokens),
        temperature: Some(config.llm.temperature),
        ..Default::default()
    };
    let retry = RetryConfig {
        max_retries: config.llm.max_retries,
        ..Default::default()
    };

    Ok(AgentContext::new(Arc::new(OpenAIProvider::new(api_key)), model)
        .with_options(options)
        .with_retry(retry)
        .with_timeouts(config.llm.timeout(), config.tools.timeout()))
}

fn build_workflow(config: &Config) -> anyhow::Result<Workflow> {
    let ctx = Arc::new(build_context(config)?);
    let research_tools = tools::search_tools(&config.tools);
    tracing::info!(tools = ?research_tools.names(), "Research tools registered");
    Ok(Workflow::with_agents(
        ctx,
        research_tools,
        Arc::new(MemoryCheckpointStore::new()),
    ))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let workflow = build_workflow(&config)?;
    let state = Arc::new(AppState::new(
        workflow,
        tools::all_tools(&config.tools),
        config.tools.timeout(),
        config.app_name.clone(),
    ));
    let app = api::router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        "Starting {} v{} on http://{}",
        config.app_name,
        config::VERSION,
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Application shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn chat(
    config: Config,
    message: String,
    conversation_id: String,
    user_id: String,
) -> anyhow::Result<()> {
    let workflow = build_workflow(&config)?;
    let outcome = workflow
        .process_message(message, conversation_id, user_id)
        .await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::ExampleConfig) = args.command {
        print!("{}", config::example_config());
        return Ok(());
    }

    dotenv::dotenv().ok();
    let mut config = Config::from_env(args.config.as_deref())?;
    init_tracing(&config, args.verbose);

    match args.command {
        Some(Command::Chat {
            message,
            conversation_id,
            user_id,
        }) => chat(config, message, conversation_id, user_id).await,
        Some(Command::Serve { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Some(Command::ExampleConfig) | None => serve(config).await,
    }
}
