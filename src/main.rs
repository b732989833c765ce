//! Tenant-aware reverse proxy (v1)
//!
//! Routes each request to the backend deployment serving the calling
//! tenant's software version.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     APP ROUTER                        │
//!                      │                                                       │
//!  Client Request      │  ┌──────────┐   ┌──────────┐   ┌───────────────────┐ │
//!  (X-Tenant-Host) ────┼─▶│  http    │──▶│ routing  │──▶│ version lookup    │◀┼──── Lookup
//!                      │  │  server  │   │ tenant   │   │ (get_version)     │ │     Service
//!                      │  └──────────┘   └──────────┘   └─────────┬─────────┘ │
//!                      │                                          ▼           │
//!                      │                                ┌───────────────────┐ │
//!                      │                                │ deployment paths  │◀┼──── Deployment
//!                      │                                │ (env priority)    │ │     Tree (fs)
//!                      │                                └─────────┬─────────┘ │
//!                      │                                          ▼           │
//!  Client Response     │  ┌──────────┐   ┌──────────┐   ┌───────────────────┐ │
//!  ◀───────────────────┼──│ response │◀──│dispatcher│◀──│ request builder   │ │
//!                      │  │  relay   │   │          │──▶│ /<version><path>  │─┼──── Backend
//!                      │  └──────────┘   └──────────┘   └───────────────────┘ │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use app_router::config::{load_config, loader::apply_env_overrides, validate_config, ProxyConfig};
use app_router::lifecycle::{signals, Shutdown};
use app_router::observability::logging;
use app_router::HttpServer;

#[derive(Parser)]
#[command(name = "app-router")]
#[command(about = "Tenant-aware reverse proxy for versioned backends", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "APP_ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = ProxyConfig::default();
            apply_env_overrides(&mut config);
            if let Err(errors) = validate_config(&config) {
                return Err(app_router::config::ConfigError::Validation(errors).into());
            }
            config
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!("app-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_file = ?cli.config,
        bind_address = %config.listener.bind_address,
        backend = %config.backend.host,
        lookup = %config.version_lookup.api_url,
        deployment_root = %config.deployments.root.display(),
        environments = ?config.deployments.environments,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_shutdown_signal(shutdown.clone()));

    let server = HttpServer::new(config, shutdown.token())?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
