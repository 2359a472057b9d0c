//! Forwarding proxy binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id ──▶ trace ──▶ API-key gate ──▶ route dispatch
//!                                                          │        │
//!                                               OPTIONS ◀──┘        ▼
//!                                             (pre-flight)   URL resolver
//!                                                                   │
//!                                                             header filter
//!                                                                   │
//!   Client ◀── CORS headers ◀── streamed body ◀── reqwest ◀─────────┘──▶ Upstream
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::config::loader::{apply_env_overrides, load_config, ConfigError};
use forward_proxy::config::validation::validate_config;
use forward_proxy::observability::{logging, metrics};
use forward_proxy::security::AuthPolicy;
use forward_proxy::{HttpServer, ProxyConfig, Shutdown};

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "HTTP forwarding proxy with CORS and API-key gate", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        prefix = %config.routing.prefix,
        "forward-proxy starting"
    );
    if !AuthPolicy::from_config(&config).is_enabled() {
        tracing::warn!(
            env = %config.auth.api_key_env,
            "No API key configured, proxy routes are open"
        );
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
