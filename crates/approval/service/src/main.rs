//! approvald - the approval platform HTTP service.
//!
//! Wires the engine against its collaborators: the directory (in-memory
//! stand-in until the real directory service is connected), storage
//! (in-memory by default, PostgreSQL behind the `postgres` feature), and
//! the background effects executor.

use approval_directory::InMemoryDirectory;
use approval_effects::{EffectsExecutor, LoggingDispatcher};
use approval_engine::ApprovalEngine;
use approval_storage::{ApprovalStorage, InMemoryStore};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod handlers;
mod router;
mod state;

use router::create_router;
use state::AppState;

/// Approval service CLI
#[derive(Parser)]
#[command(name = "approvald")]
#[command(about = "Forms-based approval platform service", long_about = None)]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(
        short,
        long,
        env = "APPROVAL_LISTEN_ADDR",
        default_value = "127.0.0.1:8080"
    )]
    listen: String,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "APPROVAL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "APPROVAL_LOG_JSON")]
    json: bool,

    /// PostgreSQL connection string (requires the `postgres` feature)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let storage = build_storage(&cli).await?;
    let directory = Arc::new(InMemoryDirectory::new());

    let (queue, executor) = EffectsExecutor::channel(Arc::new(LoggingDispatcher));
    let _effects_task = executor.spawn();

    let engine = Arc::new(ApprovalEngine::new(directory, storage, queue));
    let app = create_router(AppState::new(engine));

    let addr: SocketAddr = cli.listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "approval service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_storage(cli: &Cli) -> anyhow::Result<Arc<dyn ApprovalStorage>> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &cli.database_url {
        let store = approval_storage::PostgresStore::connect(url).await?;
        tracing::info!("using postgres storage");
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "postgres"))]
    if cli.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the postgres feature is disabled; using in-memory storage");
    }

    tracing::info!("using in-memory storage");
    Ok(Arc::new(InMemoryStore::new()))
}
