//! Headless API server entrypoint.

use memtable::{
    config::env_flag_enabled, resolve_bind_address, serve_router, AppState, Config, Database,
};
use memtable_core::constants::DEFAULT_LOG_FILTER;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if std::env::args().any(|arg| arg == "--help") {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let database = Database::new(&config.db_path)?;
    let state = AppState::new(config.clone(), database);

    let allow_public = env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("memtable running at http://{}", listener.local_addr()?);

    serve_router(listener, state, allow_public, shutdown_signal()).await?;
    Ok(())
}

fn print_help() {
    println!("memtable server\n");
    println!("Usage: memtable [OPTIONS]\n");
    println!("Options:");
    println!("  --help                Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH               Database directory (default: ~/.cache/memtable/db)");
    println!("  PORT                  Server port (default: 38511)");
    println!("  MAX_EDIT_TEXT_SIZE    Request body limit in bytes (default: 1MiB)");
    println!("  IGNORE_DELETE         Skip model deletes outside table 0");
    println!("  ALLOW_PUBLIC_ACCESS   Allow CORS from any origin and non-loopback binds");
    println!("  BIND                  Override bind address (e.g. 0.0.0.0:38511)");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully...");
}
