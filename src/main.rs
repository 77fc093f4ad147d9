//! Heartrater CLI
//!
//! Runs the collector server or the sensor relay.

use anyhow::Context;
use clap::{Parser, Subcommand};
use heartrater::{config::Config, SampleStore, VERSION};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heartrater")]
#[command(version = VERSION)]
#[command(about = "Heart-rate collector and sensor relay", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (overrides config and environment)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind to
        #[arg(long)]
        host: Option<IpAddr>,
    },

    /// Read rates from stdin, one per line, and push them to the collector
    #[cfg(feature = "relay")]
    Relay {
        /// Collector base URL (overrides config)
        #[arg(long)]
        url: Option<String>,
    },

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        #[cfg(feature = "server")]
        Commands::Serve { port, host } => cmd_serve(config, port, host),
        #[cfg(feature = "relay")]
        Commands::Relay { url } => cmd_relay(config, url),
        Commands::Config => cmd_config(&config),
    });

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_override(std::env::var(heartrater::config::PORT_ENV).ok().as_deref())?;
            config
        }
        None => Config::load()?,
    };
    Ok(config)
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config, port: Option<u16>, host: Option<IpAddr>) -> anyhow::Result<()> {
    use heartrater::server::{self, ServerConfig};

    let token = config
        .read_token()
        .with_context(|| format!("Failed to read token from {:?}", config.token_path))?;
    let host = match host {
        Some(host) => host,
        None => config
            .host
            .parse()
            .with_context(|| format!("Invalid host {:?}", config.host))?,
    };

    let server_config = ServerConfig::new(port.unwrap_or(config.port), token)
        .with_host(host)
        .with_logo(config.logo_path());
    let store = SampleStore::shared(config.capacity, config.panic_threshold);

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    runtime()?.block_on(async move {
        let (_addr, server_shutdown) = server::run(server_config, store).await?;
        tokio::task::spawn_blocking(move || shutdown_rx.recv())
            .await
            .context("Shutdown watcher failed")?
            .ok();
        let _ = server_shutdown.send(());
        Ok::<(), anyhow::Error>(())
    })
}

#[cfg(feature = "relay")]
fn cmd_relay(config: Config, url: Option<String>) -> anyhow::Result<()> {
    use heartrater::relay::{run_relay, LineSource, PushClient};

    let token = config
        .read_token()
        .with_context(|| format!("Failed to read token from {:?}", config.token_path))?;
    let url = url.unwrap_or_else(|| config.collector_url.clone());
    let client = PushClient::new(&url, token)?;
    tracing::info!("Relaying to {}", client.push_url());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(move || {
        println!("\nExit.");
        r.store(false, Ordering::SeqCst);
        // stdin reads cannot be interrupted
        std::process::exit(0);
    })?;

    let stats = runtime()?.block_on(run_relay(
        LineSource::stdin(),
        client,
        config.retry_delay,
        running,
    ))?;
    tracing::info!(
        "Delivered {} samples ({} dropped, {} rejected)",
        stats.delivered,
        stats.dropped,
        stats.rejected
    );
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler<F>(handler: F) -> anyhow::Result<()>
where
    F: FnMut() + Send + 'static,
{
    ctrlc::set_handler(handler).context("Error setting Ctrl+C handler")
}
