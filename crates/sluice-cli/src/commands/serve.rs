//! `sluice serve`: host sessions until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use sluice_config::{SluiceConfig, default_config_path};
use sluice_registry::Registry;
use sluice_remote::SessionServer;

#[derive(Args)]
pub struct ServeArgs {
    /// Configuration file (default: the platform config dir)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (0 picks a free one)
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds a session may go without a keep-alive
    #[arg(long, value_name = "SECS")]
    sweep_interval: Option<u64>,
}

/// Loads the configuration and applies command-line overrides.
fn resolve_config(args: &ServeArgs) -> anyhow::Result<SluiceConfig> {
    let mut config = match &args.config {
        Some(path) => SluiceConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SluiceConfig::load_or_default(default_config_path())?,
    };
    if let Some(bind) = &args.bind {
        config.server.bind.clone_from(bind);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(secs) = args.sweep_interval {
        config.server.sweep_interval_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let registry = Registry::new().with_pool_options(config.pool_options());
    tracing::debug!(components = registry.len(), "registry ready");

    let mut server = SessionServer::bind(config.server_options()?, Arc::new(registry))
        .context("starting session server")?;
    println!("Listening on {}", server.local_addr());
    println!("\nPress Ctrl+C to stop...\n");

    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        let _ = tx.try_send(());
    })?;
    // Either a signal or a dropped handler ends the wait.
    let _ = rx.recv();

    server.shutdown();
    Ok(())
}
