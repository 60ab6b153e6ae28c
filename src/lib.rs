//! Real-time collaborative text editing server: a sequence CRDT document
//! engine plus the room runtime (connect/broadcast/disconnect, event log
//! caps and compaction, persistence/GC/TTL loops) that serves it over
//! WebSocket and HTTP.

pub mod config;
pub mod crdt;
pub mod error;
pub mod net;
pub mod room;
pub mod wire;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use config::{Cli, ServerConfig};
use net::AppState;
use room::RoomRepository;

/// Build the application state, bind the listener, and serve until a
/// Ctrl-C/SIGTERM signal arrives, flushing every room before returning.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ServerConfig::from(&cli);
    config.ensure_dirs().await?;
    info!(data_root = %config.data_root.display(), "storage directory ready");

    let repository = Arc::new(RoomRepository::new(config.clone()));
    let state = AppState {
        repository: repository.clone(),
        config: config.clone(),
    };

    let flush_handle = room::spawn_flush_loop(repository.clone(), Duration::from_secs(config.flush_interval));
    let ttl_handle = room::spawn_ttl_purge_loop(repository.clone());

    let app = net::router(state);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    room::shutdown(&repository, flush_handle, ttl_handle).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
