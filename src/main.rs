//! Warden - supervises a child worker from the command line.
//!
//! Mostly useful for running a worker locally the way the host service would:
//! the initial config is written, known module hosts are registered, and the
//! child is kept alive until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use warden_core::{HttpNotifier, Supervisor, SupervisorConfig};

#[derive(Debug, Parser)]
#[command(name = "warden", about = "Supervise a child worker process")]
struct Args {
    /// Address the host service is bound to; passed to the child as BINDING_ADDRESS.
    #[arg(long, env = "BINDING_ADDRESS", default_value = "127.0.0.1:9000")]
    binding_address: String,

    /// Child entry point (defaults to APP_PYTHON_PATH resolution).
    #[arg(long)]
    module_path: Option<PathBuf>,

    /// Config file handed to the child (defaults to APP_PYTHON_CONFIG_PATH resolution).
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Initial config blob to write before the first start.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Known module hosts, e.g. `--hosts auth=10.0.0.1:9000,10.0.0.2:9000`.
    #[arg(long = "hosts", value_parser = parse_hosts)]
    hosts: Vec<ModuleHosts>,
}

#[derive(Debug, Clone)]
struct ModuleHosts {
    module: String,
    hosts: Vec<String>,
}

fn parse_hosts(raw: &str) -> Result<ModuleHosts, String> {
    let (module, hosts) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=HOST[,HOST...], got {raw:?}"))?;
    let hosts = hosts
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();
    Ok(ModuleHosts {
        module: module.trim().to_string(),
        hosts,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize observability
    warden_core::observability::init_tracing();

    let mut config = SupervisorConfig::from_env(args.binding_address)?;
    if let Some(path) = args.module_path {
        config.module_path = path;
    }
    if let Some(path) = args.config_path {
        config.config_path = path;
    }

    let notifier =
        HttpNotifier::new(&config.notify_base_url(), config.propagation.request_timeout)?;
    let supervisor = Supervisor::new(config, Arc::new(notifier));

    for entry in args.hosts {
        supervisor.upgrade(entry.module, entry.hosts);
    }

    let shutdown = CancellationToken::new();
    let runner = {
        let supervisor = supervisor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.start(shutdown).await })
    };

    if let Some(path) = args.config {
        let raw = tokio::fs::read(&path).await?;
        supervisor.update_config(raw)?;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("starting shutdown");
    supervisor.stop().await?;
    runner.await??;
    tracing::info!("shutdown completed");

    Ok(())
}
