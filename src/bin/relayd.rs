//! Relay Daemon - multi-party chat relay
//!
//! Accepts TCP connections, negotiates unique names, and relays broadcast
//! and private messages between members. The first member becomes the
//! coordinator; when the coordinator leaves, the role moves to the
//! alphabetically first remaining member.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default address (0.0.0.0:59001)
//! relayd
//!
//! # Custom address and config file
//! relayd --bind 127.0.0.1:4000 --config /etc/relay/relay.toml
//!
//! # Without an activity log
//! relayd --no-activity-log
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting connections and exit

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relayd::activity::ActivityLog;
use relayd::config::{Config, CONFIG_ENV};
use relayd::registry::spawn_registry;
use relayd::server::ChatServer;

/// Chat relay daemon
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// TOML config file (also read from RELAY_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Activity log file
    #[arg(long, conflicts_with = "no_activity_log")]
    activity_log: Option<PathBuf>,

    /// Do not write an activity log
    #[arg(long)]
    no_activity_log: bool,

    /// Connections served at once; further connections wait
    #[arg(long)]
    max_connections: Option<usize>,

    /// Default log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

/// Builds the effective configuration: defaults, file, environment, flags.
fn load_config(args: &Args) -> Result<Config> {
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;

    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(path) = &args.activity_log {
        config.activity_log = path.clone();
    }
    if args.no_activity_log {
        config.activity_log_enabled = false;
    }
    if let Some(max) = args.max_connections {
        config.max_connections = max;
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Installs the tracing subscriber.
fn init_tracing(level: Option<&str>) -> Result<()> {
    let level = level.unwrap_or("info");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("relayd={level}").parse()?)
                .add_directive(format!("relay_core={level}").parse()?)
                .add_directive(format!("relay_protocol={level}").parse()?),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("Failed to load configuration")?;

    init_tracing(config.log_level.as_deref()).context("Invalid log level")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Relay daemon starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Session registry started");

    let activity = if config.activity_log_enabled {
        match ActivityLog::open(&config.activity_log).await {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "Activity log unavailable, continuing without it");
                ActivityLog::disabled()
            }
        }
    } else {
        info!("Activity log disabled");
        ActivityLog::disabled()
    };

    let server = ChatServer::bind(config.bind, registry, activity.clone(), cancel_token)
        .await
        .context("Failed to start server")?
        .with_settings(config.connection_settings())
        .with_max_connections(config.max_connections);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    activity.flush().await;
    info!("Relay daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
