//! graphfs server binary
//!
//! Parses the command line, loads configuration, selects the storage backend
//! and serves the graph API until shutdown.

use std::sync::Arc;

use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

use graphfs::core::config::Config;
use graphfs::events::EventDispatcher;
use graphfs::{GraphEngine, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("graphfs")
        .version(graphfs::VERSION)
        .about("Distributed graph filesystem for applications.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("http-addr")
                .long("http-addr")
                .value_name("ADDR")
                .help("HTTP server bind address"),
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (memory, sled, cassandra, proxy)"),
        )
        .arg(
            Arg::new("storage-uri")
                .long("storage-uri")
                .value_name("URI")
                .help("Backend connection info: sled path, cluster node or remote server URL"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .get_matches();

    let mut config = Config::load(matches.get_one::<String>("config").map(String::as_str))?;
    apply_cli_overrides(&mut config, &matches)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    info!("starting {} v{}", graphfs::NAME, graphfs::VERSION);

    let storage = graphfs::storage::create_storage(&config.storage).await?;
    info!("storage initialized: {:?}", config.storage.storage_type);

    let events = Arc::new(EventDispatcher::new());
    let engine = Arc::new(GraphEngine::new(storage, events));

    graphfs::api::serve(config.server.http_addr, engine).await?;

    info!("shutdown complete");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(addr) = matches.get_one::<String>("http-addr") {
        config.server.http_addr = addr
            .parse()
            .map_err(|e| graphfs::Error::config(format!("invalid HTTP address: {}", e)))?;
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = storage_type.parse()?;
    }

    if let Some(uri) = matches.get_one::<String>("storage-uri") {
        config.storage.uri = uri.clone();
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    Ok(())
}
