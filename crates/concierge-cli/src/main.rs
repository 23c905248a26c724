//! CLI entry point for Concierge.
//!
//! Provides the `concierge` command: an interactive chat REPL, the tenant
//! job worker, and tool catalog administration.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use concierge_agent::jobs::{JobProcessor, JobQueue};
use concierge_agent::llm::gateway::Gateway;
use concierge_agent::{
    ConversationRequest, ConversationRunner, Message, OpenAiConfig, OpenAiGateway, TracingSink,
};
use concierge_store::{StoreManager, TenantId};
use concierge_tools::ToolDispatcher;

mod config;
mod worker;

use config::Config;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Concierge — a tool-calling assistant runtime.
#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Concierge — multi-tenant tool-calling assistant runtime"
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, default_value = "concierge.toml", global = true)]
    config: PathBuf,

    /// Tenant to operate on.
    #[arg(long, default_value = "default", global = true)]
    tenant: String,

    /// Reply language hint injected into every tool call.
    #[arg(long, default_value = "en", global = true)]
    language: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    Chat,

    /// Run the job worker for the tenant.
    Worker,

    /// List the tool catalog.
    Tools {
        /// Only show active tools.
        #[arg(long)]
        active_only: bool,
    },

    /// Enable a tool.
    Enable { name: String },

    /// Disable a tool.
    Disable { name: String },

    /// List models available through the gateway.
    Models,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let tenant = TenantId::new(&cli.tenant).context("invalid tenant id")?;

    let stores = StoreManager::new(&config.data_dir);
    let dispatcher = Arc::new(
        ToolDispatcher::standard(stores.clone())
            .context("failed to build tool dispatcher")?,
    );
    seed_registry(&dispatcher, &tenant).await?;

    match cli.command {
        Commands::Chat => cmd_chat(&config, dispatcher, &tenant, &cli.language).await,
        Commands::Worker => cmd_worker(&config, stores, &tenant).await,
        Commands::Tools { active_only } => cmd_tools(&dispatcher, &tenant, active_only).await,
        Commands::Enable { name } => cmd_set_active(&dispatcher, &tenant, &name, true).await,
        Commands::Disable { name } => cmd_set_active(&dispatcher, &tenant, &name, false).await,
        Commands::Models => cmd_models(&config).await,
    }
}

/// Register every dispatchable tool in the tenant's catalog so the registry
/// reflects what the dispatcher can actually route. Existing active flags
/// are preserved.
async fn seed_registry(dispatcher: &ToolDispatcher, tenant: &TenantId) -> Result<()> {
    for definition in dispatcher.tool_definitions() {
        dispatcher
            .registry()
            .register(tenant, &definition.name, &definition.description, &definition.parameters)
            .await
            .with_context(|| format!("failed to register tool `{}`", definition.name))?;
    }
    Ok(())
}

fn gateway(config: &Config) -> Result<OpenAiGateway> {
    OpenAiGateway::new(OpenAiConfig::compatible(
        config.gateway.api_key.clone(),
        config.gateway.base_url.clone(),
    ))
    .context("failed to create gateway (is CONCIERGE_API_KEY set?)")
}

// ---------------------------------------------------------------------------
// Subcommand: chat
// ---------------------------------------------------------------------------

async fn cmd_chat(
    config: &Config,
    dispatcher: Arc<ToolDispatcher>,
    tenant: &TenantId,
    language: &str,
) -> Result<()> {
    let runner = ConversationRunner::new(Arc::new(gateway(config)?), dispatcher);
    let mut history = vec![Message::system(
        "You are Concierge, a helpful assistant. Use the available tools when they help.",
    )];

    println!();
    println!("  Concierge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Type a message, or 'quit' to exit.");
    println!();
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read input")?;
        let trimmed = line.trim();
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if !trimmed.is_empty() {
            history.push(Message::user(trimmed));
            let request = ConversationRequest::new(&config.gateway.model, history.clone());
            let response = runner.run(tenant, request, language).await;

            println!("{}", response.message.content);
            history.push(response.message);
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    info!("chat session ended");
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: worker
// ---------------------------------------------------------------------------

async fn cmd_worker(config: &Config, stores: StoreManager, tenant: &TenantId) -> Result<()> {
    let queue = JobQueue::new(stores, Arc::new(TracingSink));
    let processors: Vec<Arc<dyn JobProcessor>> = vec![Arc::new(
        worker::DiffusionProcessor::new(&config.diffusion)
            .context("failed to create diffusion processor")?,
    )];

    worker::run_worker(queue, processors, tenant.clone(), &config.worker).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: tools / enable / disable
// ---------------------------------------------------------------------------

async fn cmd_tools(
    dispatcher: &ToolDispatcher,
    tenant: &TenantId,
    active_only: bool,
) -> Result<()> {
    let tools = dispatcher.registry().list(tenant, active_only).await?;
    for tool in tools {
        let marker = if tool.active { "*" } else { " " };
        println!("{marker} {:<24} {}", tool.name, tool.description);
    }
    Ok(())
}

async fn cmd_set_active(
    dispatcher: &ToolDispatcher,
    tenant: &TenantId,
    name: &str,
    active: bool,
) -> Result<()> {
    let descriptor = if active {
        dispatcher.registry().activate(tenant, name).await?
    } else {
        dispatcher.registry().deactivate(tenant, name).await?
    };
    println!(
        "{} is now {}",
        descriptor.name,
        if descriptor.active { "active" } else { "inactive" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: models
// ---------------------------------------------------------------------------

async fn cmd_models(config: &Config) -> Result<()> {
    let gateway = gateway(config)?;
    let models = gateway.available_models().await?;
    if models.is_empty() {
        println!("no models reported by {}", config.gateway.base_url);
    }
    for model in models {
        match model.owned_by {
            Some(owner) => println!("{:<40} {owner}", model.id),
            None => println!("{}", model.id),
        }
    }
    Ok(())
}
