//! Detached start: respawn the current executable as a background tracker.

use std::fs::OpenOptions;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, WttError};
use crate::process::{ProcessTable, Signal, SystemProcessTable};
use crate::registry::ProcessRegistry;

/// Spawn `wtt start --foreground` for the given project in its own process
/// group, with stdout/stderr appended to the shared log file. Returns the
/// child pid after writing the project's marker.
///
/// A previous tracker for the same project is replaced: its pid (when still
/// alive) receives SIGKILL before the new process starts.
pub fn start_detached(config: &Config, project_key: &str) -> Result<u32> {
    let registry = ProcessRegistry::new(&config.base_dir);
    registry.init()?;

    if let Some(old_pid) = registry.read_marker(project_key) {
        let table = SystemProcessTable;
        if table.is_alive(old_pid) {
            info!("replacing previous tracker (pid {})", old_pid);
            table.signal(old_pid, Signal::Kill)?;
        } else {
            warn!("previous tracker (pid {}) is already gone", old_pid);
        }
    }

    let current_exe = std::env::current_exe().map_err(WttError::SpawnFailure)?;
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(registry.log_path())?;
    let log_err = log.try_clone()?;

    let mut cmd = Command::new(current_exe);
    cmd.arg("start")
        .arg("--foreground")
        .arg("--base-dir")
        .arg(&config.base_dir)
        .arg("--interval")
        .arg(config.sample_interval_secs.to_string())
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err);

    // Own process group so the tracker survives the parent's terminal
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn().map_err(WttError::SpawnFailure)?;
    let pid = child.id();

    // The loop overwrites this with the same pid once it reaches Running
    registry.register(project_key, pid)?;

    Ok(pid)
}
