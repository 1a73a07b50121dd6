use crate::config::{Config, SupervisorSettings, UnitKind};
use crate::error::{IocmanError, Result};
use crate::logs::LogSink;
use crate::process::handle::{signal_group, ProcessHandle};
use crate::process::registry::{Unit, UnitRegistry};
use crate::process::spawner::spawn_unit;
use crate::process::types::{ActionOutcome, ControlAction, LifecycleState, UnitStatus};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// How often a stopping unit is polled for exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for the kernel to reap a SIGKILLed process
const FORCE_KILL_WAIT: Duration = Duration::from_secs(2);

/// Mutable per-unit state. Lifecycle state is always derived, never stored.
#[derive(Debug, Default)]
pub struct RuntimeRecord {
    /// Child of the most recent launch, cleared by an explicit stop
    process: Option<ProcessHandle>,
    /// Artifact of the most recent launch, kept until the next launch
    log: Option<PathBuf>,
    /// Set while an explicit stop is terminating `process`
    stopping: bool,
}

impl RuntimeRecord {
    pub fn lifecycle_state(&mut self) -> LifecycleState {
        match self.process.as_mut() {
            Some(process) => {
                if process.is_alive() {
                    LifecycleState::Running
                } else if self.stopping {
                    LifecycleState::Stopped
                } else {
                    LifecycleState::Crashed
                }
            }
            None if self.log.is_some() => LifecycleState::Stopped,
            None => LifecycleState::NeverStarted,
        }
    }

    fn live_pid(&mut self) -> Option<u32> {
        let process = self.process.as_mut()?;
        if process.is_alive() {
            Some(process.pid())
        } else {
            None
        }
    }

    pub fn log(&self) -> Option<&Path> {
        self.log.as_deref()
    }
}

/// One process-table entry
struct UnitSlot {
    unit: Unit,
    /// Serializes start/stop for this unit, held across spawn and the stop grace period
    actions: Mutex<()>,
    /// Held only for short reads and writes, never across a wait
    record: Mutex<RuntimeRecord>,
    heartbeats: AtomicU64,
}

impl UnitSlot {
    fn new(unit: Unit) -> Self {
        Self {
            unit,
            actions: Mutex::new(()),
            record: Mutex::new(RuntimeRecord::default()),
            heartbeats: AtomicU64::new(0),
        }
    }
}

/// Supervisor context: owns the process table and the log sink.
///
/// Every control action goes through [`Supervisor::start`] / [`Supervisor::stop`]
/// (or [`Supervisor::dispatch`]). Locking is per unit, so a slow stop of one
/// unit never delays actions or status reads on another.
pub struct Supervisor {
    registry: UnitRegistry,
    slots: Vec<UnitSlot>,
    index: HashMap<String, usize>,
    log_sink: LogSink,
    shell: PathBuf,
    stop_timeout: Duration,
    /// Set by `stop_all`; refuses further launches
    shutting_down: AtomicBool,
}

impl Supervisor {
    pub fn new(registry: UnitRegistry, log_sink: LogSink, settings: &SupervisorSettings) -> Self {
        let slots: Vec<UnitSlot> = registry.units().iter().cloned().map(UnitSlot::new).collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.unit.name.clone(), i))
            .collect();

        Self {
            registry,
            slots,
            index,
            log_sink,
            shell: settings.shell.clone(),
            stop_timeout: settings.stop_timeout(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Build a supervisor from a validated configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let registry = UnitRegistry::load(config.units.clone())?;
        let log_sink = LogSink::new(&config.supervisor.log_dir).await?;

        Ok(Self::new(registry, log_sink, &config.supervisor))
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn log_sink(&self) -> &LogSink {
        &self.log_sink
    }

    fn slot(&self, name: &str) -> Result<&UnitSlot> {
        self.index
            .get(name)
            .map(|&i| &self.slots[i])
            .ok_or_else(|| IocmanError::UnitNotFound(name.to_string()))
    }

    /// Run a validated control action against a unit
    pub async fn dispatch(&self, action: ControlAction, name: &str) -> Result<ActionOutcome> {
        match action {
            ControlAction::Start => self.start(name).await,
            ControlAction::Stop => self.stop(name).await,
        }
    }

    /// Launch a unit unless it already has a live process
    pub async fn start(&self, name: &str) -> Result<ActionOutcome> {
        let slot = self.slot(name)?;
        if slot.unit.kind == UnitKind::Heartbeat {
            return Ok(Self::beat(slot));
        }

        let _serial = slot.actions.lock().await;

        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(IocmanError::ShuttingDown);
        }

        if let Some(pid) = slot.record.lock().await.live_pid() {
            tracing::debug!(unit = %name, pid, "Start requested for a running unit");
            return Ok(ActionOutcome::AlreadyRunning {
                unit: name.to_string(),
                pid,
            });
        }

        let (handle, log_ref) = self.launch(&slot.unit).await?;
        let pid = handle.pid();

        {
            let mut record = slot.record.lock().await;
            record.process = Some(handle);
            record.log = Some(log_ref.clone());
        }

        tracing::info!(unit = %name, pid, log = %log_ref.display(), "Started unit");

        Ok(ActionOutcome::Started {
            unit: name.to_string(),
            log: log_ref,
            pid,
        })
    }

    /// Allocate an artifact and spawn the unit into it.
    /// On failure the artifact is discarded and nothing is recorded.
    async fn launch(&self, unit: &Unit) -> Result<(ProcessHandle, PathBuf)> {
        let launch_error = |e: IocmanError| match e {
            IocmanError::LaunchError(..) => e,
            other => IocmanError::LaunchError(unit.name.clone(), other.to_string()),
        };

        let log_ref = self.log_sink.allocate(&unit.name).await.map_err(launch_error)?;

        let spawned = match self.log_sink.bind(&log_ref).await {
            Ok(bound) => spawn_unit(unit, &self.shell, bound),
            Err(e) => Err(e),
        };

        match spawned {
            Ok(handle) => Ok((handle, log_ref)),
            Err(e) => {
                self.log_sink.discard(&log_ref).await;
                tracing::error!(unit = %unit.name, "Launch failed: {}", e);
                Err(launch_error(e))
            }
        }
    }

    /// Terminate a unit's live process: SIGTERM, then SIGKILL after the grace period
    pub async fn stop(&self, name: &str) -> Result<ActionOutcome> {
        let slot = self.slot(name)?;
        if slot.unit.kind == UnitKind::Heartbeat {
            return Ok(Self::beat(slot));
        }

        let _serial = slot.actions.lock().await;

        let pid = {
            let mut record = slot.record.lock().await;
            let Some(pid) = record.live_pid() else {
                tracing::debug!(unit = %name, "Stop requested for a unit that is not running");
                return Ok(ActionOutcome::NotRunning {
                    unit: name.to_string(),
                });
            };
            // Observers see Stopped, not Crashed, once the process dies under this stop
            record.stopping = true;
            pid
        };

        let forced = self.terminate(slot, pid).await;

        // Cleared even if death was not confirmed
        {
            let mut record = slot.record.lock().await;
            record.process = None;
            record.stopping = false;
        }

        tracing::info!(unit = %name, pid, forced, "Stopped unit");

        Ok(ActionOutcome::Stopped {
            unit: name.to_string(),
            forced,
        })
    }

    /// Returns whether SIGKILL was needed
    async fn terminate(&self, slot: &UnitSlot, pid: u32) -> bool {
        let name = &slot.unit.name;

        tracing::info!(unit = %name, pid, "Sending SIGTERM to process group");
        if let Err(e) = signal_group(pid, Signal::SIGTERM) {
            Self::warn_termination(name, format!("Failed to send SIGTERM: {}", e));
        }

        if Self::wait_for_exit(slot, self.stop_timeout).await {
            // Leader is gone, take any stragglers in its group with it
            match signal_group(pid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::debug!(unit = %name, pid, "Group sweep failed: {}", e),
            }
            return false;
        }

        tracing::warn!(
            unit = %name,
            pid,
            "Process did not exit within {:?}, sending SIGKILL",
            self.stop_timeout
        );
        if let Err(e) = signal_group(pid, Signal::SIGKILL) {
            Self::warn_termination(name, format!("Failed to send SIGKILL: {}", e));
        }

        if !Self::wait_for_exit(slot, FORCE_KILL_WAIT).await {
            Self::warn_termination(name, format!("Process {} still alive after SIGKILL", pid));
        }

        true
    }

    /// Poll the record until the recorded process has exited or `timeout` elapses.
    /// The record lock is released between polls.
    async fn wait_for_exit(slot: &UnitSlot, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if slot.record.lock().await.live_pid().is_none() {
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn warn_termination(name: &str, reason: String) {
        let warning = IocmanError::TerminationWarning(name.to_string(), reason);
        tracing::warn!(unit = %name, "{}", warning);
    }

    fn beat(slot: &UnitSlot) -> ActionOutcome {
        let count = slot.heartbeats.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(unit = %slot.unit.name, count, "Heartbeat check");

        ActionOutcome::Heartbeat {
            unit: slot.unit.name.clone(),
            count,
        }
    }

    /// Current status of every unit, in registry order. Never fails.
    pub async fn snapshot(&self) -> Vec<UnitStatus> {
        let mut statuses = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            statuses.push(Self::observe(slot).await);
        }
        statuses
    }

    /// Current status of a single unit
    pub async fn status(&self, name: &str) -> Result<UnitStatus> {
        let slot = self.slot(name)?;
        Ok(Self::observe(slot).await)
    }

    async fn observe(slot: &UnitSlot) -> UnitStatus {
        let unit = &slot.unit;

        if unit.kind == UnitKind::Heartbeat {
            return UnitStatus {
                name: unit.name.clone(),
                kind: unit.kind,
                state: LifecycleState::Beating,
                log: None,
                pid: None,
                exit_code: None,
                uptime: None,
                heartbeats: Some(slot.heartbeats.load(Ordering::SeqCst)),
            };
        }

        let mut record = slot.record.lock().await;
        let state = record.lifecycle_state();
        let (pid, exit_code, uptime) = match (state, record.process.as_ref()) {
            (LifecycleState::Running, Some(process)) => {
                (Some(process.pid()), None, Some(process.uptime()))
            }
            (LifecycleState::Crashed, Some(process)) => (None, process.exit_code(), None),
            _ => (None, None, None),
        };

        UnitStatus {
            name: unit.name.clone(),
            kind: unit.kind,
            state,
            log: record.log.clone(),
            pid,
            exit_code,
            uptime,
            heartbeats: None,
        }
    }

    /// Artifact of a unit's most recent launch
    pub async fn log_reference(&self, name: &str) -> Result<Option<PathBuf>> {
        let slot = self.slot(name)?;
        let record = slot.record.lock().await;
        Ok(record.log.clone())
    }

    /// Refuse further launches, then stop every running unit concurrently.
    /// Used on daemon shutdown.
    pub async fn stop_all(self: &Arc<Self>) -> usize {
        self.shutting_down.store(true, Ordering::SeqCst);

        let mut tasks = JoinSet::new();

        for slot in &self.slots {
            if slot.unit.kind != UnitKind::Process {
                continue;
            }
            let supervisor = Arc::clone(self);
            let name = slot.unit.name.clone();
            tasks.spawn(async move { supervisor.stop(&name).await });
        }

        tracing::info!("Stopping {} units", tasks.len());

        let mut stopped = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(ActionOutcome::Stopped { .. })) => stopped += 1,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!("Failed to stop unit: {}", e),
                Err(e) => tracing::error!("Stop task failed: {}", e),
            }
        }

        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;
    use tempfile::TempDir;

    async fn supervisor_with(units: Vec<UnitConfig>, temp_dir: &TempDir) -> Supervisor {
        let settings = SupervisorSettings {
            log_dir: temp_dir.path().join("logs"),
            stop_timeout_secs: 2,
            ..SupervisorSettings::default()
        };
        let registry = UnitRegistry::load(units).unwrap();
        let log_sink = LogSink::new(&settings.log_dir).await.unwrap();
        Supervisor::new(registry, log_sink, &settings)
    }

    #[test]
    fn test_record_state_derivation() {
        let mut record = RuntimeRecord::default();
        assert_eq!(record.lifecycle_state(), LifecycleState::NeverStarted);

        record.log = Some(PathBuf::from("logs/a.log"));
        assert_eq!(record.lifecycle_state(), LifecycleState::Stopped);
        assert_eq!(record.log(), Some(Path::new("logs/a.log")));
    }

    #[tokio::test]
    async fn test_exit_during_stop_is_not_a_crash() {
        let temp_dir = TempDir::new().unwrap();
        let sink = LogSink::new(temp_dir.path()).await.unwrap();
        let unit = Unit {
            name: "quick".to_string(),
            command: "exit 0".to_string(),
            kind: UnitKind::Process,
        };
        let log_ref = sink.allocate("quick").await.unwrap();
        let bound = sink.bind(&log_ref).await.unwrap();
        let mut handle = spawn_unit(&unit, Path::new("/bin/sh"), bound).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_alive() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut record = RuntimeRecord {
            process: Some(handle),
            log: Some(log_ref),
            stopping: false,
        };
        assert_eq!(record.lifecycle_state(), LifecycleState::Crashed);

        record.stopping = true;
        assert_eq!(record.lifecycle_state(), LifecycleState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_status_during_stop_never_reports_crashed() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = Arc::new(
            supervisor_with(vec![UnitConfig::process("svc1", "sleep 100")], &temp_dir).await,
        );

        for _ in 0..5 {
            supervisor.start("svc1").await.unwrap();

            let stopper = {
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move { supervisor.stop("svc1").await })
            };

            while !stopper.is_finished() {
                let status = supervisor.status("svc1").await.unwrap();
                assert_ne!(status.state, LifecycleState::Crashed);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            let outcome = stopper.await.unwrap().unwrap();
            assert!(matches!(outcome, ActionOutcome::Stopped { .. }));
            assert_eq!(
                supervisor.status("svc1").await.unwrap().state,
                LifecycleState::Stopped
            );
        }
    }

    #[tokio::test]
    async fn test_new_supervisor_reports_never_started() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = supervisor_with(
            vec![
                UnitConfig::process("a", "sleep 10"),
                UnitConfig::process("b", "sleep 10"),
            ],
            &temp_dir,
        )
        .await;

        let snapshot = supervisor.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        for status in snapshot {
            assert_eq!(status.state, LifecycleState::NeverStarted);
            assert!(status.log.is_none());
            assert!(status.pid.is_none());
        }
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("svc1", "sleep 100")], &temp_dir).await;

        let outcome = supervisor.start("svc1").await.unwrap();
        let log = match &outcome {
            ActionOutcome::Started { log, .. } => log.clone(),
            other => panic!("Expected Started, got {:?}", other),
        };
        assert_eq!(
            outcome.to_string(),
            format!("Started svc1, log at {}", log.display())
        );

        let status = supervisor.status("svc1").await.unwrap();
        assert_eq!(status.state, LifecycleState::Running);
        assert_eq!(status.log.as_ref(), Some(&log));
        assert!(status.pid.is_some());
        assert!(status.uptime.is_some());

        let outcome = supervisor.stop("svc1").await.unwrap();
        assert_eq!(outcome.to_string(), "Stopped svc1");
        assert!(matches!(outcome, ActionOutcome::Stopped { forced: false, .. }));

        let status = supervisor.status("svc1").await.unwrap();
        assert_eq!(status.state, LifecycleState::Stopped);
        assert_eq!(status.log.as_ref(), Some(&log));
        assert!(status.uptime.is_none());
        assert!(log.exists());
    }

    #[tokio::test]
    async fn test_duplicate_start_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("svc1", "sleep 100")], &temp_dir).await;

        let first = supervisor.start("svc1").await.unwrap();
        let second = supervisor.start("svc1").await.unwrap();

        let (first_pid, first_log) = match first {
            ActionOutcome::Started { pid, log, .. } => (pid, log),
            other => panic!("Expected Started, got {:?}", other),
        };
        assert_eq!(
            second,
            ActionOutcome::AlreadyRunning {
                unit: "svc1".to_string(),
                pid: first_pid,
            }
        );
        assert_eq!(second.to_string(), "svc1 is already running");

        // No second artifact was allocated
        assert_eq!(
            supervisor.log_reference("svc1").await.unwrap(),
            Some(first_log)
        );
        let artifacts = std::fs::read_dir(supervisor.log_sink().log_dir())
            .unwrap()
            .count();
        assert_eq!(artifacts, 1);

        supervisor.stop("svc1").await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_not_running() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("svc1", "sleep 100")], &temp_dir).await;

        let outcome = supervisor.stop("svc1").await.unwrap();
        assert_eq!(outcome.to_string(), "svc1 is not running");

        let status = supervisor.status("svc1").await.unwrap();
        assert_eq!(status.state, LifecycleState::NeverStarted);
    }

    #[tokio::test]
    async fn test_crash_detected_on_observation() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("flaky", "exit 3")], &temp_dir).await;

        supervisor.start("flaky").await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut status = supervisor.status("flaky").await.unwrap();
        while status.state == LifecycleState::Running && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
            status = supervisor.status("flaky").await.unwrap();
        }

        assert_eq!(status.state, LifecycleState::Crashed);
        assert_eq!(status.exit_code, Some(3));
        assert!(status.log.is_some());

        // Stopping a crashed unit leaves it crashed
        let outcome = supervisor.stop("flaky").await.unwrap();
        assert!(matches!(outcome, ActionOutcome::NotRunning { .. }));
        let status = supervisor.status("flaky").await.unwrap();
        assert_eq!(status.state, LifecycleState::Crashed);
    }

    #[tokio::test]
    async fn test_restart_after_crash_uses_new_log() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("flaky", "exit 1")], &temp_dir).await;

        let first_log = match supervisor.start("flaky").await.unwrap() {
            ActionOutcome::Started { log, .. } => log,
            other => panic!("Expected Started, got {:?}", other),
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while supervisor.status("flaky").await.unwrap().state != LifecycleState::Crashed
            && Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let second_log = match supervisor.start("flaky").await.unwrap() {
            ActionOutcome::Started { log, .. } => log,
            other => panic!("Expected Started, got {:?}", other),
        };

        assert_ne!(first_log, second_log);
        assert!(first_log.exists());
        assert_eq!(
            supervisor.log_reference("flaky").await.unwrap(),
            Some(second_log)
        );
    }

    #[tokio::test]
    async fn test_stop_escalates_to_sigkill() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = supervisor_with(
            vec![UnitConfig::process("stubborn", "trap '' TERM; sleep 100")],
            &temp_dir,
        )
        .await;

        supervisor.start("stubborn").await.unwrap();
        // Give the shell time to install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        let outcome = supervisor.stop("stubborn").await.unwrap();
        let elapsed = started.elapsed();

        assert!(matches!(outcome, ActionOutcome::Stopped { forced: true, .. }));
        assert!(elapsed >= Duration::from_secs(2));

        let status = supervisor.status("stubborn").await.unwrap();
        assert_eq!(status.state, LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_unknown_unit() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor =
            supervisor_with(vec![UnitConfig::process("svc1", "sleep 100")], &temp_dir).await;

        assert!(matches!(
            supervisor.start("ghost").await,
            Err(IocmanError::UnitNotFound(_))
        ));
        assert!(matches!(
            supervisor.stop("ghost").await,
            Err(IocmanError::UnitNotFound(_))
        ));
        assert!(supervisor.status("ghost").await.is_err());

        let snapshot = supervisor.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, LifecycleState::NeverStarted);
    }

    #[tokio::test]
    async fn test_launch_error_leaves_record_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let settings = SupervisorSettings {
            log_dir: temp_dir.path().join("logs"),
            shell: PathBuf::from("/nonexistent/sh"),
            ..SupervisorSettings::default()
        };
        let registry = UnitRegistry::load(vec![UnitConfig::process("svc1", "sleep 1")]).unwrap();
        let log_sink = LogSink::new(&settings.log_dir).await.unwrap();
        let supervisor = Supervisor::new(registry, log_sink, &settings);

        let result = supervisor.start("svc1").await;
        assert!(matches!(result, Err(IocmanError::LaunchError(..))));

        let status = supervisor.status("svc1").await.unwrap();
        assert_eq!(status.state, LifecycleState::NeverStarted);
        assert!(status.log.is_none());

        // The allocated artifact was discarded
        let artifacts = std::fs::read_dir(&settings.log_dir).unwrap().count();
        assert_eq!(artifacts, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_counts() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = supervisor_with(
            vec![
                UnitConfig::heartbeat("Heartbeat"),
                UnitConfig::process("svc1", "sleep 100"),
            ],
            &temp_dir,
        )
        .await;

        let first = supervisor.start("Heartbeat").await.unwrap();
        let second = supervisor.stop("Heartbeat").await.unwrap();
        assert_eq!(first.to_string(), "Heartbeat check performed, count=1");
        assert_eq!(second.to_string(), "Heartbeat check performed, count=2");

        let status = supervisor.status("Heartbeat").await.unwrap();
        assert_eq!(status.state, LifecycleState::Beating);
        assert_eq!(status.heartbeats, Some(2));
        assert!(status.log.is_none());

        // Nothing was launched for the heartbeat unit
        let artifacts = std::fs::read_dir(supervisor.log_sink().log_dir())
            .unwrap()
            .count();
        assert_eq!(artifacts, 0);
    }

    #[tokio::test]
    async fn test_stop_all() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = Arc::new(
            supervisor_with(
                vec![
                    UnitConfig::heartbeat("Heartbeat"),
                    UnitConfig::process("a", "sleep 100"),
                    UnitConfig::process("b", "sleep 100"),
                    UnitConfig::process("c", "sleep 100"),
                ],
                &temp_dir,
            )
            .await,
        );

        supervisor.start("a").await.unwrap();
        supervisor.start("b").await.unwrap();

        let stopped = supervisor.stop_all().await;
        assert_eq!(stopped, 2);

        let states: Vec<LifecycleState> = supervisor
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.state)
            .collect();
        assert_eq!(
            states,
            vec![
                LifecycleState::Beating,
                LifecycleState::Stopped,
                LifecycleState::Stopped,
                LifecycleState::NeverStarted,
            ]
        );
    }

    #[tokio::test]
    async fn test_start_after_stop_all_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = Arc::new(
            supervisor_with(
                vec![
                    UnitConfig::heartbeat("Heartbeat"),
                    UnitConfig::process("svc1", "sleep 100"),
                ],
                &temp_dir,
            )
            .await,
        );

        supervisor.stop_all().await;

        assert!(matches!(
            supervisor.start("svc1").await,
            Err(IocmanError::ShuttingDown)
        ));
        assert_eq!(
            supervisor.status("svc1").await.unwrap().state,
            LifecycleState::NeverStarted
        );

        // Heartbeat checks never launch anything and keep answering
        assert!(supervisor.start("Heartbeat").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_starts_racing_stop_all_leave_nothing_running() {
        let temp_dir = TempDir::new().unwrap();
        let names = ["a", "b", "c", "d"];
        let supervisor = Arc::new(
            supervisor_with(
                names
                    .iter()
                    .map(|name| UnitConfig::process(*name, "sleep 100"))
                    .collect(),
                &temp_dir,
            )
            .await,
        );

        let mut starters = JoinSet::new();
        for round in 0..20 {
            let supervisor = Arc::clone(&supervisor);
            let name = names[round % names.len()];
            starters.spawn(async move { supervisor.start(name).await });
        }

        supervisor.stop_all().await;
        while let Some(joined) = starters.join_next().await {
            match joined.unwrap() {
                Ok(_) | Err(IocmanError::ShuttingDown) => {}
                Err(e) => panic!("Unexpected start error: {}", e),
            }
        }

        for status in supervisor.snapshot().await {
            assert_ne!(status.state, LifecycleState::Running, "{} left running", status.name);
        }
    }
}
