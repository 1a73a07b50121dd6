use crate::process::{LifecycleState, Supervisor, UnitStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A unit whose observed state changed between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub unit: String,
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub exit_code: Option<i32>,
}

/// Remembers the last observed state of every unit
#[derive(Debug, Default)]
pub struct TransitionTracker {
    last: HashMap<String, LifecycleState>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a snapshot against the previous one. The first sighting of a
    /// unit is recorded without producing a transition.
    pub fn observe(&mut self, statuses: &[UnitStatus]) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for status in statuses {
            match self.last.insert(status.name.clone(), status.state) {
                Some(previous) if previous != status.state => transitions.push(Transition {
                    unit: status.name.clone(),
                    from: previous,
                    to: status.state,
                    exit_code: status.exit_code,
                }),
                _ => {}
            }
        }

        transitions
    }
}

/// Observe the supervisor every `interval` and log state changes, forever
pub async fn watch_units(supervisor: Arc<Supervisor>, interval: Duration) {
    let mut tracker = TransitionTracker::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        for transition in tracker.observe(&supervisor.snapshot().await) {
            if transition.to == LifecycleState::Crashed {
                tracing::warn!(
                    unit = %transition.unit,
                    exit_code = ?transition.exit_code,
                    "Unit exited without a stop request"
                );
            } else {
                tracing::debug!(
                    unit = %transition.unit,
                    from = %transition.from,
                    to = %transition.to,
                    "Unit state changed"
                );
            }
        }
    }
}
