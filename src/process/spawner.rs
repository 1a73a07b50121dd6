use crate::error::{IocmanError, Result};
use crate::logs::BoundLog;
use crate::process::handle::ProcessHandle;
use crate::process::registry::Unit;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Launch a unit's command through `shell` as a detached process group
///
/// Combined stdout/stderr go straight to the bound log artifact; the
/// supervisor keeps no copy of the file handles once the child is running.
///
/// # Arguments
/// * `unit` - Unit whose command is launched
/// * `shell` - Shell interpreting the command (`<shell> -c <command>`)
/// * `log` - Artifact receiving the child's output
///
/// # Returns
/// * `Ok(ProcessHandle)` - Successfully spawned process
/// * `Err(IocmanError::LaunchError)` - The OS refused to spawn it
pub fn spawn_unit(unit: &Unit, shell: &Path, log: BoundLog) -> Result<ProcessHandle> {
    let (stdout, stderr) = log
        .into_stdio()
        .map_err(|e| IocmanError::LaunchError(unit.name.clone(), e.to_string()))?;

    let mut command = Command::new(shell);
    command
        .arg("-c")
        .arg(&unit.command)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .process_group(0);

    let child = command.spawn().map_err(|e| {
        IocmanError::LaunchError(
            unit.name.clone(),
            format!("Failed to spawn {}: {}", shell.display(), e),
        )
    })?;

    let pid = child.id().ok_or_else(|| {
        IocmanError::LaunchError(unit.name.clone(), "Failed to get PID".to_string())
    })?;

    Ok(ProcessHandle::new(child, pid))
}
