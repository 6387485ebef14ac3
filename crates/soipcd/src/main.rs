//! soipcd - service-oriented IPC routing daemon
//!
//! Local applications register over the daemon's channel and have their
//! requests, responses, and events routed locally or to remote peers.
//!
//! Usage:
//!   soipcd [config.toml]
//!
//! Without a config file the daemon runs with defaults: unix datagram
//! channels under /tmp/soipc and a UDP endpoint on 127.0.0.1:30490.

use soipc_routing::{Daemon, DaemonConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// Daemon config file (TOML)
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args { config_path: None };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"soipcd - service-oriented IPC routing daemon

Usage: soipcd [OPTIONS] [config.toml]

Options:
  -h, --help    Print this help message

Examples:
  # Run with defaults (unix channels under /tmp/soipc, UDP on 127.0.0.1:30490)
  soipcd

  # Run with a config file
  soipcd soipcd.toml
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soipcd=info,soipc_routing=info,soipc_transport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args();

    let config = if let Some(ref path) = args.config_path {
        tracing::info!("Loading config from: {}", path);
        DaemonConfig::load(path)?
    } else {
        tracing::info!("No config file provided, using defaults");
        DaemonConfig::default()
    };

    let mut daemon = Daemon::init(config).await?;
    let _handle = daemon.start()?;

    tracing::info!("soipcd running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    daemon.stop().await?;

    Ok(())
}
