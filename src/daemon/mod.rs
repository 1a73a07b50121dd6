// Daemon module - Serves the supervisor to control surfaces over IPC

mod watcher;

pub use watcher::{watch_units, Transition, TransitionTracker};

use crate::config::Config;
use crate::error::{IocmanError, Result};
use crate::ipc::{Command, IpcServer, ResponseData};
use crate::logs::read_last_lines;
use crate::metrics::{sample_loop, MetricsHistory};
use crate::process::Supervisor;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::RwLock;

/// Long-running service state shared by every connection task
pub struct Daemon {
    supervisor: Arc<Supervisor>,
    metrics: Arc<RwLock<MetricsHistory>>,
    poll_interval: Duration,
    started_at: Instant,
}

impl Daemon {
    pub fn new(supervisor: Arc<Supervisor>, metrics_capacity: usize, poll_interval: Duration) -> Self {
        Self {
            supervisor,
            metrics: Arc::new(RwLock::new(MetricsHistory::new(metrics_capacity))),
            poll_interval,
            started_at: Instant::now(),
        }
    }

    /// Build the supervisor and metrics history from a validated configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let supervisor = Supervisor::from_config(config).await?;

        Ok(Self::new(
            Arc::new(supervisor),
            config.supervisor.metrics_capacity,
            config.supervisor.poll_interval(),
        ))
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub fn metrics(&self) -> &Arc<RwLock<MetricsHistory>> {
        &self.metrics
    }

    /// Answer one control-surface command
    pub async fn handle_command(&self, command: Command) -> Result<ResponseData> {
        match command {
            Command::Control { action, unit } => {
                let outcome = self.supervisor.dispatch(action, &unit).await?;
                Ok(ResponseData::Action(outcome))
            }

            Command::Status => Ok(ResponseData::Status(self.supervisor.snapshot().await)),

            Command::Logs { unit, lines } => {
                let log = self.supervisor.log_reference(&unit).await?;
                let lines = match &log {
                    Some(path) => read_last_lines(path, lines).await?,
                    None => Vec::new(),
                };
                Ok(ResponseData::Logs { unit, log, lines })
            }

            Command::Metrics { last } => {
                let history = self.metrics.read().await;
                let points = match last {
                    Some(count) => history.last_points(count),
                    None => history.points(),
                };
                Ok(ResponseData::Metrics(points))
            }

            Command::Ping => Ok(ResponseData::Pong {
                uptime: self.started_at.elapsed(),
                units: self.supervisor.registry().len(),
            }),
        }
    }

    /// Serve `server` and the background tasks until `shutdown` resolves, then
    /// stop every running unit
    ///
    /// # Arguments
    /// * `server` - An IPC server that has already been started
    /// * `shutdown` - Resolves when the daemon should exit
    ///
    /// # Returns
    /// * `Ok(())` - Shutdown completed
    /// * `Err(IocmanError::IpcError)` - The server stopped accepting connections
    pub async fn run<S>(self: Arc<Self>, server: &IpcServer, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let sampler = tokio::spawn(sample_loop(Arc::clone(&self.metrics), self.poll_interval));
        let watcher = tokio::spawn(watch_units(Arc::clone(&self.supervisor), self.poll_interval));

        let daemon = Arc::clone(&self);
        let served = tokio::select! {
            result = server.run(move |command| {
                let daemon = Arc::clone(&daemon);
                async move { daemon.handle_command(command).await }
            }) => result,
            _ = shutdown => Ok(()),
        };

        sampler.abort();
        watcher.abort();

        tracing::info!("Shutting down, stopping running units");
        let stopped = self.supervisor.stop_all().await;
        tracing::info!("Stopped {} unit(s)", stopped);

        served
    }
}

/// Install SIGTERM/SIGINT handlers and return a future resolving on the first one
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| IocmanError::Other(format!("Failed to install SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| IocmanError::Other(format!("Failed to install SIGINT handler: {}", e)))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
    })
}
