use anyhow::{Context, Result};
use clap::Parser;
use iocman::config::Config;
use iocman::daemon::{shutdown_signal, Daemon};
use iocman::ipc::IpcServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// iocman daemon - Owns the IOC units and serves the control socket
#[derive(Parser, Debug)]
#[command(name = "iocman-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Unit configuration file (.yaml, .toml or .json)
    #[arg(short, long, default_value = "iocs.yaml")]
    config: PathBuf,

    /// Override the control socket path
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Override the log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    if let Some(socket) = args.socket {
        config.supervisor.socket_path = socket;
    }
    if let Some(log_dir) = args.log_dir {
        config.supervisor.log_dir = log_dir;
    }

    info!(
        units = config.units.len(),
        log_dir = %config.supervisor.log_dir.display(),
        "Starting iocman daemon"
    );

    let daemon = Daemon::from_config(&config)
        .await
        .context("Failed to initialize supervisor")?;

    let mut server = IpcServer::with_socket_path(&config.supervisor.socket_path);
    server.start().context("Failed to start IPC server")?;

    let shutdown = shutdown_signal().context("Failed to install signal handlers")?;
    let served = Arc::new(daemon).run(&server, shutdown).await;

    server.stop().context("Failed to remove control socket")?;
    served.context("IPC server failed")?;

    info!("Daemon stopped");
    Ok(())
}
