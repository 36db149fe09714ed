//! Ping Bot Example
//!
//! A console front-end for Hikari: every line typed on stdin is a chat
//! message in channel `console`, replies are printed to stdout.
//!
//! Commands live under `src/commands`, one module per file. The directory is
//! scanned at startup and each file is matched to its `export_module!`.
//!
//! # Usage
//!
//! ```bash
//! cd demos/ping_bot
//! cargo run
//! > !ping
//! > ?kk
//! > !echo hello world
//! > !help
//! ```

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use hikari::prelude::*;
use hikari::runtime::config::ConfigLoader;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ping-bot", about = "Hikari console bot")]
struct Args {
    /// Config file; `hikari.toml` in the working directory by default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Config profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Command directory, overriding the config file.
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Load every exported module instead of scanning a directory.
    #[arg(long, conflicts_with = "directory")]
    manifest: bool,
}

// ============================================================================
// Console Outbound
// ============================================================================

struct ConsoleOutbound;

#[async_trait]
impl Outbound for ConsoleOutbound {
    async fn reply(&self, message: &dyn ChatMessage, content: &str) -> Result<(), BoxError> {
        println!("[reply to {}] {content}", message.id());
        Ok(())
    }

    async fn send(&self, channel_id: &str, content: &str) -> Result<(), BoxError> {
        println!("[#{channel_id}] {content}");
        Ok(())
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    let mut config = loader.load()?;
    if args.manifest {
        config.commands.directory = None;
    } else if let Some(directory) = args.directory {
        config.commands.directory = Some(directory);
    }

    let (mut client, report) = ClientBuilder::from_config(config)
        .outbound(Arc::new(ConsoleOutbound))
        .load()
        .await?;

    for error in &report.errors {
        warn!(location = %error.location(), "{error}");
    }
    info!(
        modules = report.loaded.len(),
        commands = report.command_count(),
        "Type a command, Ctrl+C to quit"
    );

    let Some(bus) = client.event_bus().cloned() else {
        anyhow::bail!("client was built without its own event bus");
    };
    bus.emit("ready", vec![json!(client.registry().len())]);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let messages = futures::stream::unfold((lines, 0u64), |(mut lines, n)| async move {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let message = TextMessage::new(format!("console-{n}"), "console", line).boxed();
                Some((message, (lines, n + 1)))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                None
            }
        }
    })
    .inspect(|message| {
        bus.emit("messageCreate", vec![json!(message.content())]);
    });

    let invoked = client.run(messages, shutdown).await;
    client.shutdown();
    info!(invoked, "Bye");

    Ok(())
}
