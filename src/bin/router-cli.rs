use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use app_router::config::{load_config, loader::apply_env_overrides, ProxyConfig};
use app_router::routing::{classify, BackendPathResolver, ResolvedVersion, VersionResolver};

#[derive(Parser)]
#[command(name = "router-cli")]
#[command(about = "Diagnostics for the tenant router's resolution steps", long_about = None)]
struct Cli {
    /// Router configuration file; defaults are used when omitted.
    #[arg(short, long, env = "APP_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the environment category of a tenant host
    Classify { host: String },
    /// Ask the version-lookup service for a tenant's routable version
    Version { host: String },
    /// Search the deployment tree for a version
    Locate { version: String },
    /// Resolve version and deployment path the way the router does
    Resolve { host: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let mut config = ProxyConfig::default();
            apply_env_overrides(&mut config);
            config
        }
    };

    let output = match cli.command {
        Commands::Classify { host } => match classify(&host) {
            Ok(environment) => json!({ "host": host, "environment": environment }),
            Err(e) => json!({ "host": host, "error": e.to_string() }),
        },
        Commands::Version { host } => {
            let resolver = VersionResolver::new(&config.version_lookup)?;
            let version = resolver.resolve(&host).await;
            json!({
                "host": host,
                "lookup_url": resolver.lookup_url(&host).as_str(),
                "version": version.as_ref().map(ResolvedVersion::as_str),
            })
        }
        Commands::Locate { version } => {
            let token = ResolvedVersion::parse(&version)
                .ok_or_else(|| format!("invalid version token `{version}`"))?;
            let locator = Arc::new(BackendPathResolver::from_config(&config.deployments));
            let path = locator.resolve_blocking(token).await;
            json!({
                "version": version,
                "environments": config.deployments.environments,
                "path": path.map(|p| p.display().to_string()),
            })
        }
        Commands::Resolve { host } => resolve(&config, &host).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn resolve(config: &ProxyConfig, host: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let environment = classify(host).map(|e| e.to_string()).ok();
    let resolver = VersionResolver::new(&config.version_lookup)?;

    let Some(version) = resolver.resolve(host).await else {
        return Ok(json!({ "host": host, "environment": environment, "version": Value::Null }));
    };

    let locator = Arc::new(BackendPathResolver::from_config(&config.deployments));
    let path = locator.resolve_blocking(version.clone()).await;
    let target = format!(
        "http://{}/{}/",
        config.backend.host.trim_end_matches('/'),
        version
    );

    Ok(json!({
        "host": host,
        "environment": environment,
        "version": version.as_str(),
        "target": target,
        "resolved_path": path.map(|p| p.display().to_string()),
    }))
}
