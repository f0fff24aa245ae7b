// server/src/cli/cli.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio::signal::unix::{signal, SignalKind};

use caching::Cache;
use storage::open_store;

use crate::api::{self, Services};
use crate::config::load_server_config;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Medbook appointment service", long_about = None)]
#[clap(propagate_version = true)]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[clap(long, short = 'f', value_name = "PATH")]
    pub config: Option<String>,
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Listen port, overriding the configuration file
        #[clap(long, value_name = "PORT")]
        port: Option<u16>,
        /// Storage directory, overriding the configuration file
        #[clap(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },
}

/// Resolves once SIGTERM or SIGINT arrives.
async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to set up SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to set up SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
    }
}

/// Loads config, opens the store, wires the services, and serves the
/// API until a shutdown signal lands.
async fn serve(
    config_path: Option<&str>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_server_config(config_path)?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.storage.data_dir = data_dir;
    }

    let store = open_store(&config.storage)
        .await
        .context("Failed to open the document store")?;
    let cache = Cache::with_ttl(
        config.cache.capacity,
        Duration::from_secs(config.cache.ttl_seconds),
    );
    let services = Services::new(Arc::clone(&store), cache);
    let routes = api::routes(services);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    info!("medbook API listening on {}", addr);

    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, shutdown_signal());
    server.await;

    store.flush().await?;
    store.close().await?;
    info!("Shut down cleanly");
    Ok(())
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    match args
        .command
        .unwrap_or(Commands::Serve { port: None, data_dir: None })
    {
        Commands::Serve { port, data_dir } => serve(args.config.as_deref(), port, data_dir).await,
    }
}
