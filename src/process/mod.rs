// Process module - Unit registry, lifecycle control and status reporting

mod handle;
mod registry;
mod spawner;
mod supervisor;
mod types;

pub use handle::{signal_group, ProcessHandle};
pub use registry::{Unit, UnitRegistry};
pub use spawner::spawn_unit;
pub use supervisor::{RuntimeRecord, Supervisor};
pub use types::{ActionOutcome, ControlAction, LifecycleState, UnitStatus};
