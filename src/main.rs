use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use oj::config::{DispatcherConfig, NodeConfig};
use oj::dispatch::{Dispatcher, HttpNodeClient, ProblemStore, Registry};
use oj::engine::{Compiler, Judge, NameSequence, Runner, WorkspaceManager};

#[derive(Parser, Debug)]
#[command(name = "oj", version, about = "Online judge node and dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a judge node serving POST /CompileAndRun
    Node(NodeConfig),
    /// Run the user-facing dispatcher in front of the judge nodes
    Dispatcher(DispatcherConfig),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("oj=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    match cli.command {
        Commands::Node(config) => run_node(config, shutdown).await,
        Commands::Dispatcher(config) => run_dispatcher(config, shutdown).await,
    }
}

async fn run_node(config: NodeConfig, shutdown: CancellationToken) -> Result<()> {
    info!("Starting Judge Node...");

    let toolchain = config.toolchain()?;
    let judge = Arc::new(Judge::new(
        WorkspaceManager::new(&config.workspace_dir, Arc::new(NameSequence::new())),
        Compiler::new(toolchain),
        Runner::new(),
    ));

    let root = judge.workspaces().root();
    judge
        .workspaces()
        .ensure_root()
        .await
        .with_context(|| format!("Failed to create workspace root {}", root.display()))?;
    info!("Workspace root: {}", root.display());

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    oj::engine::server::serve(listener, judge, shutdown).await?;

    info!("Judge node stopped");
    Ok(())
}

async fn run_dispatcher(config: DispatcherConfig, shutdown: CancellationToken) -> Result<()> {
    info!("Starting Dispatcher...");

    let problems = Arc::new(ProblemStore::load(&config.problems_dir)?);
    if problems.is_empty() {
        warn!(
            "No problems loaded from {}; every submission will be rejected",
            config.problems_dir.display()
        );
    }
    let registry = Arc::new(Registry::from_file(&config.nodes_config)?);
    if registry.is_empty() {
        anyhow::bail!(
            "No judge nodes configured in {}",
            config.nodes_config.display()
        );
    }

    let client = HttpNodeClient::new(config.connect_timeout(), config.request_timeout())
        .context("Failed to build node HTTP client")?;
    let policy = config.retry_policy();
    info!(
        "Retry policy: max_attempts={}, deadline={:?}",
        policy.max_attempts, policy.deadline
    );

    let dispatcher = Arc::new(Dispatcher::new(
        problems,
        registry,
        Arc::new(client),
        policy,
    ));

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    oj::dispatch::server::serve(listener, dispatcher, shutdown).await?;

    info!("Dispatcher stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn wait_for_signal(shutdown: CancellationToken) {
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown.cancel();
}
