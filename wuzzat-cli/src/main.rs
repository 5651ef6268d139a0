//! wuzzat-cli - Command-line interface for wuzzat
//!
//! Runs an echo server or sends one message and prints the reply.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wuzzat_protocol::{FramingKind, SerializerKind, DEFAULT_ADDRESS};

#[derive(Parser)]
#[command(name = "wuzzat-cli")]
#[command(about = "Framed TCP messaging: echo server and one-shot client")]
#[command(version)]
struct Cli {
    /// Address as scheme://hostname:port
    #[arg(short, long, env = "WUZZAT_ADDRESS", default_value = DEFAULT_ADDRESS)]
    address: String,

    /// Object serializer (json, msgpack)
    #[arg(short, long, env = "WUZZAT_SERIALIZER", default_value = "json")]
    serializer: SerializerKind,

    /// Frame layout (length_prefixed, delimited)
    #[arg(short, long, env = "WUZZAT_FRAMING", default_value = "length_prefixed")]
    framing: FramingKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run an echo server until Ctrl+C
    Listen {
        /// YAML config file; its address and codec override the flags above
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Send one message and print the reply
    Send {
        /// Message JSON (or @file.json to read from file)
        message: String,

        /// How long to wait for a reply, in milliseconds
        #[arg(short, long, default_value = "2000")]
        timeout_ms: u64,

        /// Do not wait for a reply
        #[arg(long)]
        no_wait: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let codec = commands::Codec {
        serializer: cli.serializer,
        framing: cli.framing,
    };

    let result = match cli.command {
        Commands::Listen { config } => commands::listen(&cli.address, codec, config).await,
        Commands::Send {
            message,
            timeout_ms,
            no_wait,
        } => {
            let wait = (!no_wait).then(|| std::time::Duration::from_millis(timeout_ms));
            commands::send(&cli.address, codec, &message, wait).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }
    Ok(())
}
