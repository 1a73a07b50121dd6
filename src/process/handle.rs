use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::ExitStatus;
use std::time::{Duration, SystemTime};
use tokio::process::Child;

/// Ownership of one launched child, the leader of its own process group
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    started_at: SystemTime,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    pub fn new(child: Child, pid: u32) -> Self {
        Self {
            child,
            pid,
            started_at: SystemTime::now(),
            exit_status: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uptime(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or(Duration::from_secs(0))
    }

    /// Poll the OS for liveness. Reaps the child once it has exited.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, "Failed to poll process status: {}", e);
                false
            }
        }
    }

    /// Exit code of a reaped process, `None` while alive or when killed by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|status| status.code())
    }
}

/// Send `signal` to every process in the group led by `pid`
pub fn signal_group(pid: u32, signal: Signal) -> nix::Result<()> {
    signal::killpg(Pid::from_raw(pid as i32), signal)
}
