//! bibsearch-server - Main entry point
//!
//! Search-and-disambiguate HTTP service for bibliographic identifiers
//! (DOI/ISBN/ISSN/PMID). A single endpoint takes a free-text identifier,
//! answers with the extracted items, or parks the operation behind a session
//! token when the client has to choose among several candidates.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibsearch_server::{api, providers};

/// Command-line arguments for bibsearch-server
#[derive(Parser, Debug)]
#[command(name = "bibsearch-server")]
#[command(about = "Search-and-disambiguate service for bibliographic identifiers")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "1969", env = "BIBSEARCH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0", env = "BIBSEARCH_BIND")]
    bind: std::net::IpAddr,

    /// Seconds a suspended session stays resumable
    #[arg(long, default_value = "60", env = "BIBSEARCH_SESSION_TTL")]
    session_ttl: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibsearch_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting bibsearch-server v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        args.port
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("bibsearch-server/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    let engine = providers::default_engine(client);
    let state = api::AppState::new(engine, Duration::from_secs(args.session_ttl));
    let app = api::build_router(state);

    let addr = SocketAddr::from((args.bind, args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
