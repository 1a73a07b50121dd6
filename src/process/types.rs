use crate::config::UnitKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Derived classification of a unit, computed on every observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No launch has ever been recorded
    NeverStarted,
    /// The recorded process is alive
    Running,
    /// The last process was stopped through the supervisor
    Stopped,
    /// The recorded process exited without a stop request
    Crashed,
    /// Heartbeat units have no process and always report this
    Beating,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::NeverStarted => write!(f, "Never started"),
            LifecycleState::Running => write!(f, "Running"),
            LifecycleState::Stopped => write!(f, "Stopped"),
            LifecycleState::Crashed => write!(f, "Crashed"),
            LifecycleState::Beating => write!(f, "Beating"),
        }
    }
}

/// Point-in-time view of one unit, as returned by a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    pub name: String,
    pub kind: UnitKind,
    pub state: LifecycleState,
    /// Artifact of the most recent launch, kept after stop or crash
    pub log: Option<PathBuf>,
    /// Set while Running
    pub pid: Option<u32>,
    /// Set when Crashed and the process exited with a code
    pub exit_code: Option<i32>,
    /// Time since launch, set while Running
    pub uptime: Option<Duration>,
    /// Set for heartbeat units
    pub heartbeats: Option<u64>,
}

/// Closed set of control actions a control surface may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    Start,
    Stop,
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAction::Start => write!(f, "start"),
            ControlAction::Stop => write!(f, "stop"),
        }
    }
}

/// Result of a control action. `Display` gives the operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Started { unit: String, log: PathBuf, pid: u32 },
    AlreadyRunning { unit: String, pid: u32 },
    Stopped { unit: String, forced: bool },
    NotRunning { unit: String },
    Heartbeat { unit: String, count: u64 },
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Started { unit, log, .. } => {
                write!(f, "Started {}, log at {}", unit, log.display())
            }
            ActionOutcome::AlreadyRunning { unit, .. } => write!(f, "{} is already running", unit),
            ActionOutcome::Stopped { unit, .. } => write!(f, "Stopped {}", unit),
            ActionOutcome::NotRunning { unit } => write!(f, "{} is not running", unit),
            ActionOutcome::Heartbeat { count, .. } => {
                write!(f, "Heartbeat check performed, count={}", count)
            }
        }
    }
}
