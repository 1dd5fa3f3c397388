//! romdb Server Binary
//!
//! Loads the dataset and serves it over TCP until Ctrl+C.

use std::process;
use std::sync::Arc;

use clap::Parser;
use romdb::config::{Backend, BootPolicy, ProtocolKind};
use romdb::network::Server;
use romdb::{protocol, Config, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// romdb Server
#[derive(Parser, Debug)]
#[command(name = "romdb-server")]
#[command(about = "Read-only key-value server with hot reload")]
#[command(version)]
struct Args {
    /// Address to bind to (host:port)
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    addr: String,

    /// Protocol: memcached
    #[arg(short, long, default_value = "memcached")]
    proto: ProtocolKind,

    /// Store backend: sstable, json
    #[arg(short, long, default_value = "sstable")]
    store: Backend,

    /// Data file
    #[arg(short, long, default_value = "./data/sample.sst")]
    file: String,

    /// Watch interval in milliseconds
    #[arg(short, long, default_value = "5000")]
    watch_interval_ms: u64,

    /// Start with an empty dataset if the initial load fails
    #[arg(long)]
    allow_empty_boot: bool,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,romdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("romdb server v{}", romdb::VERSION);
    tracing::info!("Data file: {} ({})", args.file, args.store);
    tracing::info!("Listen address: {}", args.addr);

    let boot_policy = if args.allow_empty_boot {
        BootPolicy::AllowEmpty
    } else {
        BootPolicy::Strict
    };

    let config = Config::builder()
        .source_path(&args.file)
        .backend(args.store)
        .protocol(args.proto)
        .boot_policy(boot_policy)
        .watch_interval_ms(args.watch_interval_ms)
        .listen_addr(&args.addr)
        .max_connections(args.max_connections)
        .build();

    // Open store (blocks until the dataset is servable)
    let store = match Store::open(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            process::exit(1);
        }
    };

    let codec = protocol::from_kind(config.protocol);
    let server = match Server::bind(config.clone(), Arc::clone(&store), codec) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            shutdown_store(&store);
            process::exit(1);
        }
    };

    // Ctrl+C stops the accept loop; the store is shut down below
    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        handle.shutdown();
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let served = server.run();
    shutdown_store(&store);

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        process::exit(1);
    }

    tracing::info!("Server stopped");
}

fn shutdown_store(store: &Store) {
    if let Err(e) = store.shutdown() {
        tracing::error!("Store shutdown failed: {}", e);
        process::exit(2);
    }
}
