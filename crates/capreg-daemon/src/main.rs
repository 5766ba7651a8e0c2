#![deny(unsafe_code)]
use anyhow::Result;
use capreg_config::RegistryConfig;
use capreg_daemon::Daemon;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "capreg-daemon", version, about = "Capabilities registry daemon")]
struct Args {
    /// Enable verbose request/response debug logging, overriding `LOG_LEVEL`.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = RegistryConfig::from_env()?;

    let filter = if args.debug {
        EnvFilter::new("capreg=debug")
    } else {
        EnvFilter::new(config.log_level.clone())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        nats_url = %config.nats_url,
        registry_subject = %config.registry_subject,
        bootstrap_subject = %config.bootstrap_subject,
        "starting capreg-daemon"
    );

    let daemon = Daemon::start(config).await?;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    info!("shutting down");
    daemon.shutdown().await;
    Ok(())
}
