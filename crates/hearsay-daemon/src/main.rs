// crates/hearsay-daemon/src/main.rs
//
// Binary entrypoint for the Hearsay daemon.
//
// Parses CLI arguments, loads configuration, initializes tracing, loads or
// creates the node identity, opens storage, starts the P2P listener and
// bootstrap dials, then runs the background scheduler until ctrl-c.

mod config;
mod scheduler;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use config::{expand_tilde, DaemonConfig, StorageBackend};
use scheduler::Scheduler;

use hearsay_core::LocalIdentity;
use hearsay_node::{Node, NodeStores};
use hearsay_store::{MemoryStore, RocksStore};

/// Hearsay daemon: runs one node of the attestation network.
#[derive(Parser, Debug)]
#[command(name = "hearsay-daemon", version = "0.1.0", about = "Hearsay network node daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.hearsay/config.toml")]
    config: String,

    /// Listen address, overriding `network.listen_addr`.
    #[arg(long)]
    listen: Option<String>,

    /// Advertised URL, overriding `network.advertise_url`.
    #[arg(long)]
    advertise_url: Option<String>,

    /// Extra bootstrap peers (comma separated), appended to the configured list.
    #[arg(long, value_delimiter = ',')]
    bootstrap: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load before tracing is up so the configured level applies; report after.
    let loaded = DaemonConfig::load(&args.config);
    let log_level = match &loaded {
        Ok(cfg) => cfg.log_level.clone(),
        Err(_) => DaemonConfig::default().log_level,
    };

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let mut daemon_config = match loaded {
        Ok(cfg) => {
            tracing::info!("Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "Could not load config from {}: {}. Using defaults.",
                args.config,
                e
            );
            DaemonConfig::default()
        }
    };

    // CLI flags override the config file.
    if let Some(listen) = args.listen {
        daemon_config.network.listen_addr = listen;
    }
    if let Some(url) = args.advertise_url {
        daemon_config.network.advertise_url = Some(url);
    }
    daemon_config.network.bootstrap_peers.extend(args.bootstrap);

    tracing::info!("Hearsay Daemon v0.1.0");
    tracing::info!("Data directory: {}", daemon_config.data_dir);
    tracing::info!("Storage backend: {:?}", daemon_config.storage);

    let identity_path = expand_tilde(&daemon_config.identity_path);
    let identity = LocalIdentity::load_or_create(Path::new(&identity_path))?;
    tracing::info!("Node ID: {}", identity.node_id());

    let stores = match daemon_config.storage {
        StorageBackend::Rocksdb => {
            let data_dir = expand_tilde(&daemon_config.data_dir);
            std::fs::create_dir_all(&data_dir)?;
            let rocksdb_path = format!("{}/rocksdb", data_dir);
            let store = RocksStore::open(&rocksdb_path)?;
            tracing::info!("RocksDB opened at {}", rocksdb_path);
            NodeStores::shared(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on exit");
            NodeStores::shared(Arc::new(MemoryStore::new()))
        }
    };

    let node = Arc::new(Node::new(
        identity,
        daemon_config.network.clone(),
        daemon_config.trust.clone(),
        stores,
    ));

    let addr = node.start().await?;
    tracing::info!(
        "Listening on {} (advertising {})",
        addr,
        node.network()
            .advertise_url()
            .await
            .unwrap_or_else(|| "nothing".to_string())
    );
    if !daemon_config.network.bootstrap_peers.is_empty() {
        tracing::info!(
            "Bootstrapping from {} peers",
            daemon_config.network.bootstrap_peers.len()
        );
    }

    let scheduler = Scheduler::new(
        node.clone(),
        Duration::from_secs(daemon_config.consensus_interval_secs),
        Duration::from_secs(daemon_config.housekeeping_interval_secs),
    );
    let stats = scheduler.run().await?;
    tracing::info!(
        "Ran {} consensus ticks ({} failed) and {} housekeeping passes",
        stats.consensus_ticks,
        stats.failed_consensus_ticks,
        stats.housekeeping_ticks
    );

    tracing::info!("Hearsay daemon shut down gracefully");
    Ok(())
}
