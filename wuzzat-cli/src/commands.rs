//! Command execution.

use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use wuzzat_client::{Client, ClientEvent, ClientOptions};
use wuzzat_protocol::{FrameCodec, FramingKind, SerializerKind};
use wuzzat_server::{Config, Server, ServerEvent, ServerOptions};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Wire format selected on the command line.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub serializer: SerializerKind,
    pub framing: FramingKind,
}

/// Runs an echo server until interrupted.
pub async fn listen(address: &str, codec: Codec, config: Option<PathBuf>) -> CliResult {
    let server = match config {
        Some(path) => {
            let config = Config::load_from(&path)?;
            Server::with_address(config.network.address.clone(), config.server_options())
        }
        None => {
            let options = ServerOptions::new()
                .with_serializer(codec.serializer.build())
                .with_framing(FrameCodec::from_kind(codec.framing));
            Server::new(address, options)?
        }
    };

    let mut events = server.subscribe();
    server.start().await?;
    if let Some(bound) = server.local_addr() {
        eprintln!(
            "{} on {}://{}",
            "Listening".green(),
            server.address().scheme(),
            bound
        );
    }
    eprintln!("{}", "Press Ctrl+C to stop...".dimmed());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ServerEvent::Connection(connection)) => {
                    eprintln!("{} {}", "+".green(), connection.peer_addr());
                }
                Ok(ServerEvent::Disconnection(connection)) => {
                    eprintln!("{} {}", "-".yellow(), connection.peer_addr());
                }
                Ok(ServerEvent::Data { connection, message }) => {
                    println!("{} {}", connection.peer_addr().to_string().cyan(), message.value);
                    connection.write(message.payload);
                }
                Ok(ServerEvent::Error { connection, error }) => {
                    let peer = connection
                        .map(|c| c.peer_addr().to_string())
                        .unwrap_or_else(|| "listener".to_string());
                    eprintln!("{} [{}]: {}", "Error".red(), peer, error);
                }
                Ok(ServerEvent::Started | ServerEvent::Stopped) => {}
                Err(RecvError::Lagged(n)) => {
                    eprintln!("{}: lagged {} events", "Warning".yellow(), n);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", "Stopping...".dimmed());
                break;
            }
        }
    }

    server.stop().await?;
    Ok(())
}

/// Sends one message and prints the first reply, if any.
pub async fn send(address: &str, codec: Codec, message: &str, wait: Option<Duration>) -> CliResult {
    let value = parse_json_arg(message)?;
    let options = ClientOptions::new()
        .with_serializer(codec.serializer.build())
        .with_framing(FrameCodec::from_kind(codec.framing));
    let (client, mut events) = Client::new(address, options)?;
    client.send(&value);

    let outcome = tokio::time::timeout(wait.unwrap_or(Duration::from_secs(5)), async {
        loop {
            match events.recv().await {
                Ok(ClientEvent::Connected) => {
                    if wait.is_none() {
                        // Exiting drops the client, so let the queue drain first.
                        while client.queued_bytes() > 0 {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                        }
                        return Ok(None);
                    }
                }
                Ok(ClientEvent::Data(reply)) => return Ok(Some(reply.value)),
                Ok(ClientEvent::Disconnected { error: Some(e), .. }) => {
                    return Err(e.to_string());
                }
                Ok(ClientEvent::Disconnected { error: None, .. }) => {
                    return Err("connection closed by peer".to_string());
                }
                Ok(ClientEvent::Error(e)) => return Err(e.to_string()),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err("client closed".to_string()),
            }
        }
    })
    .await;

    match outcome {
        Ok(Ok(Some(reply))) => println!("{}", format_json(&reply)),
        Ok(Ok(None)) => eprintln!("{} to {}", "Sent".green(), client.address()),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(format!("no reply from {} in time", client.address()).into()),
    }
    Ok(())
}

/// Parses a JSON argument (either inline JSON or @file.json).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
