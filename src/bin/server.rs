//! poolvfs Worker Binary
//!
//! Serves a slot pool over TCP.

use clap::Parser;
use poolvfs::network::Server;
use poolvfs::{Config, Dispatcher, LogLevel, PoolError};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

/// poolvfs Worker
#[derive(Parser, Debug)]
#[command(name = "poolvfs-worker")]
#[command(about = "Pooled VFS storage worker")]
#[command(version)]
struct Args {
    /// Backing directory
    #[arg(short, long, default_value = "./poolvfs_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7461")]
    listen: String,

    /// Slots created when the backing directory is empty
    #[arg(short, long, default_value = "6")]
    capacity: usize,

    /// Wipe every slot on first initialization
    #[arg(long)]
    clear: bool,

    /// Initial log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    // Initialize tracing/logging behind a reload layer for setLogLevel
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},poolvfs={}", args.log_level, args.log_level)));
    let (filter, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();

    tracing::info!("poolvfs worker v{}", poolvfs::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .initial_capacity(args.capacity)
        .clear_on_init(args.clear)
        .build();

    let mut dispatcher = match Dispatcher::open(config.clone()) {
        Ok(d) => d.with_log_hook(Box::new(move |level: LogLevel| {
            reload_handle
                .modify(|filter| *filter = EnvFilter::new(level.as_str()))
                .map_err(|e| PoolError::Config(e.to_string()))
        })),
        Err(e) => {
            tracing::error!("Failed to open data directory: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(&mut dispatcher) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
