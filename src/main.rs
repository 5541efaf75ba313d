//! Message Center Server
//!
//! Run with: cargo run -- --config config.toml
//!
//! Connect with any line-based TCP client, e.g. `nc localhost 7070`.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use msgcenter::config::generate_default_config;
use msgcenter::{server, Config, HeartbeatConfig, LoggingConfig, MessageCenter, SenderHandle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "msgcenter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Message center for monitoring and controlling application senders")]
struct Cli {
    /// Path to a TOML config file (default: search standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the built-in heartbeat sender
    #[arg(long)]
    no_heartbeat: bool,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_heartbeat {
        config.heartbeat.enabled = false;
    }

    init_logging(&config.logging);
    tracing::info!("Message Center v{}", env!("CARGO_PKG_VERSION"));

    let center = Arc::new(MessageCenter::new(config.broker.clone()));

    let heartbeat = if config.heartbeat.enabled {
        let handle = center
            .register_sender(&config.heartbeat.sender)
            .context("failed to register heartbeat sender")?;
        Some(tokio::spawn(run_heartbeat(handle, config.heartbeat.clone())))
    } else {
        tracing::info!("Heartbeat sender disabled");
        None
    };

    let listener = server::bind(&config.server).await?;
    server::serve(Arc::clone(&center), listener, &config.server, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await?;

    tracing::info!("Shutting down...");
    if let Some(heartbeat) = heartbeat {
        heartbeat.abort();
    }
    center.shutdown();

    tracing::info!("Message Center stopped");
    Ok(())
}

/// Initialize tracing; `RUST_LOG` takes precedence over the config level
fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("msgcenter={}", config.level).into());

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Post `alive <n>` every interval and answer relayed commands
async fn run_heartbeat(mut handle: SenderHandle, config: HeartbeatConfig) {
    let started = Utc::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    let mut beats: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                beats += 1;
                handle.post_line(&format!("alive {}", beats));
            }
            command = handle.recv_command() => {
                let Some(command) = command else { break };
                tracing::debug!(sender = %handle.name(), command = %command, "Heartbeat command");

                let reply = match command.as_str() {
                    "status" => {
                        let uptime = Utc::now() - started;
                        format!(
                            "up since {} ({}s), {} beats",
                            started.to_rfc3339(),
                            uptime.num_seconds(),
                            beats
                        )
                    }
                    _ => format!("unknown command: {}", command),
                };
                handle.post_line(&reply);
            }
        }
    }
}
