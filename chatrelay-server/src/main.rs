//! chatrelay server
//!
//! Relays a shared chat conversation to an OpenAI-compatible provider and
//! streams the reply to browser listeners over Server-Sent Events.
//!
//! # Usage
//!
//! ```bash
//! # Configuration from the environment
//! OPENAI_API_KEY=sk-... chatrelay
//!
//! # Configuration file, custom listen address
//! chatrelay --config relay.yaml --bind 0.0.0.0:8080
//!
//! # With verbose logging
//! RUST_LOG=debug chatrelay
//! ```
//!
//! # Environment Variables
//!
//! - `OPENAI_API_KEY`: provider API key (required without a config file)
//! - `CHATRELAY_CONFIG`: configuration file path
//! - `CHATRELAY_BIND`: listen address
//! - `CHATRELAY_MODEL`, `CHATRELAY_BASE_URL`, `CHATRELAY_MAX_TOKENS`,
//!   `CHATRELAY_RELAY_CAPACITY`, `CHATRELAY_SYSTEM_PROMPT`: provider and session settings
//! - `RUST_LOG`: log filter

use anyhow::{Context, Result};
use chatrelay_core::config::{self, SafeLogging};
use chatrelay_core::Session;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Streaming chat completion relay
#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (.yaml, .yml or .json)
    #[arg(short = 'c', long, env = "CHATRELAY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short = 'b', long, env = "CHATRELAY_BIND", value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay_server=info,chatrelay_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => config::load_from_env().context("Failed to read configuration from environment")?,
    };
    info!("Configuration: {}", config.safe_for_logging());

    let addr = match args.bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid listen address: {}", config.server.bind))?,
    };

    let session = Arc::new(Session::from_config(&config).context("Failed to create session")?);
    let app = chatrelay_server::router(session.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("chatrelay {} listening on {}", chatrelay_core::version(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(session))
        .await
        .context("Server error")?;

    info!("chatrelay stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, after closing the relay so open streams end
async fn shutdown_signal(session: Arc<Session>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    session.shutdown();
}
