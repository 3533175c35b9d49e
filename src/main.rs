//! Deskpulse CLI
//!
//! Occupancy and ergonomics tracking agent for networked standing desks.

use clap::{Parser, Subcommand};
use deskpulse::{
    config::Config,
    store::MemoryStore,
    telemetry::{DeskApiClient, TelemetryCache, TelemetryConfig},
    VERSION,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deskpulse")]
#[command(version = VERSION)]
#[command(about = "Occupancy and ergonomics tracking for standing desks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent: HTTP API plus telemetry cache refresher
    Run {
        /// Port to bind the API to (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Base URL of the desk telemetry API (overrides config)
        #[arg(long)]
        telemetry_url: Option<String>,

        /// API key for the telemetry API (overrides config)
        #[arg(long)]
        telemetry_api_key: Option<String>,

        /// Bearer token for admin endpoints (overrides config)
        #[arg(long)]
        admin_token: Option<String>,

        /// Reported minutes per elapsed second, e.g. 0.25 for demo clocks
        #[arg(long)]
        time_scale: Option<f64>,
    },

    /// Check a running agent
    Status {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("deskpulse=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            port,
            telemetry_url,
            telemetry_api_key,
            admin_token,
            time_scale,
        } => cmd_run(port, telemetry_url, telemetry_api_key, admin_token, time_scale).await,
        Commands::Status { host, port } => cmd_status(&host, port).await,
        Commands::Config => cmd_config(),
    }
}

async fn cmd_run(
    port: Option<u16>,
    telemetry_url: Option<String>,
    telemetry_api_key: Option<String>,
    admin_token: Option<String>,
    time_scale: Option<f64>,
) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(url) = telemetry_url {
        config.telemetry_url = url;
    }
    if let Some(key) = telemetry_api_key {
        config.telemetry_api_key = key;
    }
    if let Some(token) = admin_token {
        config.admin_token = token;
    }
    if let Some(scale) = time_scale {
        config.seconds_to_reported_minutes = scale;
    }

    println!("Deskpulse agent v{VERSION}");
    println!();
    println!("  Telemetry source: {}", config.telemetry_url);
    println!(
        "  Cache refresh: every {}s",
        config.cache_refresh_interval.as_secs()
    );
    println!("  Sit/stand threshold: {}mm", config.threshold_mm);
    println!(
        "  Reporting scale: {} min/s",
        config.seconds_to_reported_minutes
    );
    println!(
        "  Admin endpoints: {}",
        if config.admin_enabled() {
            "enabled"
        } else {
            "disabled (no admin token)"
        }
    );
    println!();

    let cache = Arc::new(TelemetryCache::new(config.cache_refresh_interval));
    let client = DeskApiClient::new(TelemetryConfig::new(
        config.telemetry_url.clone(),
        config.telemetry_api_key.clone(),
        config.telemetry_timeout,
    ))?;
    let refresher = tokio::spawn(
        cache
            .clone()
            .run_refresh_task(client, config.cache_refresh_interval),
    );

    let store = Arc::new(MemoryStore::new());
    let (addr, shutdown_tx) = deskpulse::server::run(config, store, cache).await?;

    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Shutting down...");
    let _ = shutdown_tx.send(());
    refresher.abort();

    Ok(())
}

async fn cmd_status(host: &str, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or_else(|| Config::load().unwrap_or_default().port);
    let url = format!("http://{host}:{port}/health");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .build()?;

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            let body: serde_json::Value = response.json().await?;
            println!("Agent is running at {host}:{port}");
            println!(
                "  Version: {}",
                body["version"].as_str().unwrap_or("unknown")
            );
        }
        Ok(response) => {
            println!("Agent responded with {}", response.status());
        }
        Err(e) => {
            println!("No agent reachable at {host}:{port} ({e})");
        }
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    println!("Config file: {:?}", Config::config_path());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
