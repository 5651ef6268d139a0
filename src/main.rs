//! wuzzat - framed TCP message transport
//!
//! Echo server driven by the server configuration (defaults, WUZZAT_CONFIG
//! file, then WUZZAT_* environment overrides).

use tracing_subscriber::EnvFilter;
use wuzzat_server::{Config, Server, ServerEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("WUZZAT_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!("Starting wuzzat echo server");
    tracing::info!("  Address: {}", config.network.address);
    tracing::info!("  Serializer: {}", config.codec.serializer);
    tracing::info!(
        "  Framing: {} (max frame {} bytes)",
        config.codec.framing,
        config.codec.max_frame_size
    );
    match config.network.max_connections {
        0 => tracing::info!("  Max connections: unlimited"),
        n => tracing::info!("  Max connections: {}", n),
    }

    let server = Server::with_address(config.network.address.clone(), config.server_options());
    let mut events = server.subscribe();
    server.start().await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ServerEvent::Data { connection, message }) => {
                    tracing::debug!(
                        "[{}] Echoing {} bytes",
                        connection.peer_addr(),
                        message.len()
                    );
                    connection.write(message.payload);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Echo loop lagged {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    server.stop().await?;
    tracing::info!("Server stopped");
    Ok(())
}
