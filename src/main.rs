use anyhow::{Context, Result};
use clap::Parser;
use mmsc_core::config::AppConfig;
use mmsc_core::Peer;
use mmsc_discovery::{PeerRegistry, RegistryEventKind};
use mmsc_stream::{StreamClient, StreamEventKind};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// MMS Companion - discovers a media-meta-stream service on the local
/// network and follows its location stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Log filter override (e.g. "debug,mdns_sd=warn")
    #[arg(long, env = "MMSC_LOG")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Every setting has a default, so a missing config file is fine
    let config = if args.config.exists() {
        AppConfig::from_config_builder(&args.config)
            .with_context(|| format!("failed to load config from {}", args.config.display()))?
    } else {
        AppConfig::default()
    };
    config.validate().context("invalid configuration")?;

    let filter = args
        .log
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter)),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "mms-companion starting");

    let registry = PeerRegistry::new(config.discovery.clone())?;
    // A failed browse start is session-scoped; 'r' retries it
    if let Err(e) = registry.start_discovery() {
        warn!(error = %e, "discovery did not start");
    }

    let client = StreamClient::new(config.stream.clone());

    print_peers(&registry.peers());

    let registry_events = registry.event_receiver();
    let stream_events = client.event_receiver();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = registry_events.recv() => {
                let Ok(event) = event else { break };
                match event.kind {
                    RegistryEventKind::PeerDiscovered { peer, peers } => {
                        info!(peer = %peer, "service available");
                        print_peers(&peers);
                    }
                    RegistryEventKind::ResolveFailed { instance, reason } => {
                        warn!(instance, reason, "service could not be resolved");
                    }
                }
            }

            event = stream_events.recv() => {
                let Ok(event) = event else { break };
                match event.kind {
                    StreamEventKind::Opened { peer } => {
                        println!("Connected to {peer}; streaming locations.");
                    }
                    StreamEventKind::Location(update) => {
                        println!("Location: {update}");
                    }
                    StreamEventKind::Closed { peer, reason } => {
                        let stats = client.status().metrics().snapshot();
                        println!(
                            "Disconnected from {peer}: {reason} ({} frames, {} bytes received)",
                            stats.frames_received, stats.bytes_received
                        );
                        // Back to the selection surface
                        print_peers(&registry.peers());
                    }
                }
            }

            line = lines.next_line() => match line.context("failed to read stdin")? {
                None => break,
                Some(line) => {
                    if handle_command(line.trim(), &registry, &client) {
                        break;
                    }
                }
            },

            _ = signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        }
    }

    client.disconnect();
    if let Err(e) = registry.stop() {
        warn!(error = %e, "failed to stop discovery cleanly");
    }

    Ok(())
}

/// Runs one line of user input. Returns true when the shell should exit.
fn handle_command(input: &str, registry: &PeerRegistry, client: &StreamClient) -> bool {
    match input {
        "" => {}
        "q" | "quit" => return true,
        "d" | "disconnect" => client.disconnect(),
        "r" | "rediscover" => {
            // Non-fatal: the registry stays usable and can be retried
            if let Err(e) = registry.start_discovery() {
                warn!(error = %e, "discovery restart failed");
            }
        }
        _ => match input.parse::<usize>() {
            Ok(index) => {
                let peers = registry.peers();
                match peers.get(index) {
                    Some(peer) => select_peer(client, peer.clone()),
                    None => println!("No service at index {index}."),
                }
            }
            Err(_) => {
                println!("Commands: <number> connect, 'd' disconnect, 'r' rediscover, 'q' quit.");
            }
        },
    }
    false
}

/// Selection entry point: hands one discovered peer to the stream client.
fn select_peer(client: &StreamClient, peer: Peer) {
    println!("Connecting to {peer}...");
    client.connect(peer);
}

fn print_peers(peers: &[Peer]) {
    if peers.is_empty() {
        println!("Searching for services on the local network...");
        return;
    }

    println!("Known services:");
    for (index, peer) in peers.iter().enumerate() {
        println!("  [{index}] {peer}");
    }
    println!("Select a service by number, 'd' to disconnect, 'r' to rediscover, 'q' to quit.");
}
