// CLI module - User-facing command-line interface

mod output;

use crate::error::{IocmanError, Result};
use crate::ipc::{Command, IpcClient, ResponseData, DEFAULT_SOCKET_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// iocman - Supervise a fixed set of IOC units through a running daemon
#[derive(Parser)]
#[command(name = "iocman")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Daemon socket path
    #[arg(short, long, global = true, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a unit (a no-op if it is already running)
    Start {
        /// Unit name as listed in the configuration
        unit: String,
    },

    /// Stop a unit, escalating to SIGKILL after the stop timeout
    Stop {
        /// Unit name as listed in the configuration
        unit: String,
    },

    /// Show the lifecycle state of every unit
    Status {
        /// Refresh the table until interrupted
        #[arg(short, long)]
        watch: bool,

        /// Refresh interval in seconds when watching
        #[arg(short, long, default_value = "2")]
        interval: u64,
    },

    /// Show the tail of a unit's most recent log
    Logs {
        /// Unit name as listed in the configuration
        unit: String,

        /// Number of lines to display
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },

    /// Show recent host CPU and network samples
    Metrics {
        /// Number of most recent samples to display
        #[arg(short, long, default_value = "20")]
        last: usize,
    },

    /// Check that the daemon is reachable
    Ping,
}

impl Cli {
    /// Run the CLI application
    pub fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute().inspect_err(|e| output::print_error(&e.to_string()))
    }

    /// Execute the parsed command
    fn execute(&self) -> Result<()> {
        let client = IpcClient::with_socket_path(&self.socket);

        match &self.command {
            Commands::Status { watch: true, interval } => {
                watch_status(&client, Duration::from_secs((*interval).max(1)))
            }
            Commands::Stop { unit } => {
                let spinner = output::create_progress_bar(&format!("Stopping {}...", unit));
                match client.request(Command::stop(unit.clone())) {
                    Ok(data) => {
                        spinner.finish_and_clear();
                        output::print_response(&data);
                        Ok(())
                    }
                    Err(e) => {
                        output::finish_progress_error(spinner, &format!("Failed to stop {}", unit));
                        Err(e)
                    }
                }
            }
            _ => {
                let data = client.request(self.build_command()?)?;
                output::print_response(&data);
                Ok(())
            }
        }
    }

    /// Build an IPC command from the CLI arguments
    fn build_command(&self) -> Result<Command> {
        match &self.command {
            Commands::Start { unit } => Ok(Command::start(unit.clone())),
            Commands::Stop { unit } => Ok(Command::stop(unit.clone())),
            Commands::Status { .. } => Ok(Command::Status),
            Commands::Logs { unit, lines } => Ok(Command::Logs {
                unit: unit.clone(),
                lines: *lines,
            }),
            Commands::Metrics { last } => {
                if *last == 0 {
                    return Err(IocmanError::Other(
                        "--last must be at least 1".to_string(),
                    ));
                }
                Ok(Command::Metrics { last: Some(*last) })
            }
            Commands::Ping => Ok(Command::Ping),
        }
    }
}

/// Redraw the status table every `interval` until the process is interrupted
fn watch_status(client: &IpcClient, interval: Duration) -> Result<()> {
    loop {
        match client.request(Command::Status)? {
            ResponseData::Status(units) => {
                output::clear_screen();
                output::print_status_table(&units);
            }
            other => {
                return Err(IocmanError::ProtocolError(format!(
                    "Unexpected response to status: {:?}",
                    other
                )))
            }
        }
        std::thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_start_builds_control_command() {
        let cli = parse(&["iocman", "start", "svc1"]);
        match cli.build_command().unwrap() {
            Command::Control { unit, .. } => assert_eq!(unit, "svc1"),
            other => panic!("Expected Control, got {:?}", other),
        }
        assert_eq!(cli.socket, PathBuf::from(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn test_logs_default_line_count() {
        let cli = parse(&["iocman", "logs", "svc1"]);
        match cli.build_command().unwrap() {
            Command::Logs { unit, lines } => {
                assert_eq!(unit, "svc1");
                assert_eq!(lines, 50);
            }
            other => panic!("Expected Logs, got {:?}", other),
        }
    }

    #[test]
    fn test_global_socket_flag() {
        let cli = parse(&["iocman", "status", "--socket", "/tmp/other.sock"]);
        assert_eq!(cli.socket, PathBuf::from("/tmp/other.sock"));
        assert!(matches!(cli.build_command().unwrap(), Command::Status));
    }

    #[test]
    fn test_metrics_rejects_zero() {
        let cli = parse(&["iocman", "metrics", "--last", "0"]);
        assert!(cli.build_command().is_err());
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["iocman", "restart", "svc1"]).is_err());
    }
}
