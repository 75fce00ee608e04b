use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use norsh_chain::api;
use norsh_chain::bootstrap::Bootstrap;
use norsh_chain::clock::Clock;
use norsh_chain::config::WorkerConfig;
use norsh_chain::crypto::{generate_keypair, save_keypair};
use norsh_chain::dispatch::Dispatcher;
use norsh_chain::queue::{QueueConsumer, queue_channel};
use norsh_chain::services::Services;

const QUEUE_CAPACITY: usize = 1_024;

#[derive(Parser)]
#[command(author, version, about = "Norsh ledger write-side worker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the worker using the provided configuration file
    Start {
        #[arg(short, long, default_value = "config/worker.toml")]
        config: PathBuf,
    },
    /// Generate a default worker configuration file
    GenerateConfig {
        #[arg(short, long, default_value = "config/worker.toml")]
        path: PathBuf,
    },
    /// Generate a new Ed25519 keypair for genesis signing
    Keygen {
        #[arg(short, long, default_value = "keys/worker.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_worker(config).await?,
        Commands::GenerateConfig { path } => generate_config(path)?,
        Commands::Keygen { path } => keygen(path)?,
    }

    Ok(())
}

async fn start_worker(config_path: PathBuf) -> Result<()> {
    let config = if config_path.exists() {
        WorkerConfig::load(&config_path)?
    } else {
        let config = WorkerConfig::default();
        config.save(&config_path)?;
        config
    };

    let rpc_addr = config.rpc_listen;
    let workers = config.defaults.queue_consumer_thread_pool;
    let services = Services::build(config.clone(), Clock::system())?;

    let bootstrap = Bootstrap::new(
        config,
        services.sequences.clone(),
        services.semaphore.clone(),
        services.elements.clone(),
        services.clock.clone(),
    );
    tokio::task::spawn_blocking(move || bootstrap.run()).await??;

    let dispatcher = Arc::new(Dispatcher::new(services.clone()));
    let (publisher, receiver) = queue_channel(QUEUE_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = QueueConsumer::new(dispatcher.clone(), workers);
    let consumer_task = tokio::spawn(consumer.run(receiver, shutdown_rx));
    let api_task = tokio::spawn(api::serve(services, dispatcher, publisher, rpc_addr));

    signal::ctrl_c().await?;
    info!("shutdown signal received");
    shutdown_tx.send(true)?;
    consumer_task.await?;
    api_task.abort();
    Ok(())
}

fn generate_config(path: PathBuf) -> Result<()> {
    let config = WorkerConfig::default();
    config.ensure_directories()?;
    config.save(&path)?;
    info!(?path, "wrote default configuration");
    Ok(())
}

fn keygen(path: PathBuf) -> Result<()> {
    let keypair = generate_keypair();
    save_keypair(&path, &keypair)?;
    info!(?path, "generated worker keypair");
    Ok(())
}
