// IPC Protocol definitions for client-daemon communication

use crate::metrics::MetricsPoint;
use crate::process::{ActionOutcome, ControlAction, UnitStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// All available commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Start or stop a single unit
    Control { action: ControlAction, unit: String },
    /// Status of every unit in registry order
    Status,
    /// Tail of a unit's most recent log artifact
    Logs { unit: String, lines: usize },
    /// Recent host samples, all retained ones when `last` is `None`
    Metrics { last: Option<usize> },
    Ping,
}

impl Command {
    pub fn start(unit: impl Into<String>) -> Self {
        Command::Control {
            action: ControlAction::Start,
            unit: unit.into(),
        }
    }

    pub fn stop(unit: impl Into<String>) -> Self {
        Command::Control {
            action: ControlAction::Stop,
            unit: unit.into(),
        }
    }
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    /// Result of a start/stop request
    Action(ActionOutcome),
    /// Snapshot of all units
    Status(Vec<UnitStatus>),
    /// Log lines, empty when the unit was never launched
    Logs {
        unit: String,
        log: Option<PathBuf>,
        lines: Vec<String>,
    },
    Metrics(Vec<MetricsPoint>),
    Pong { uptime: Duration, units: usize },
}

/// Request message from client to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub command: Command,
}

/// Response message from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: Result<ResponseData, String>,
}

impl Request {
    pub fn new(id: u64, command: Command) -> Self {
        Self { id, command }
    }
}

impl Response {
    pub fn success(id: u64, data: ResponseData) -> Self {
        Self {
            id,
            result: Ok(data),
        }
    }

    pub fn error(id: u64, error: String) -> Self {
        Self {
            id,
            result: Err(error),
        }
    }
}
