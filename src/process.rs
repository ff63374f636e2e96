//! OS process table capability.
//!
//! Process ids are lookup keys, never handles with lifetime guarantees. The
//! `ProcessTable` trait keeps the selector testable without spawning real
//! processes; `SystemProcessTable` is the live implementation backed by
//! kill(2) probes and sysinfo command-line enumeration.

use sysinfo::{ProcessRefreshKind, System, UpdateKind};

use crate::error::{Result, WttError};

/// Signal kinds the tracker management commands deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful stop; the tracking loop flushes its final delta
    Interrupt,
    /// Forced stop, no flush
    Kill,
}

/// Capability view of the live OS process table
pub trait ProcessTable {
    /// Whether a process with this pid currently exists
    fn is_alive(&self, pid: u32) -> bool;

    /// Deliver a signal. A pid that no longer exists is treated as
    /// already-terminated (success); any other delivery failure surfaces.
    fn signal(&self, pid: u32, signal: Signal) -> Result<()>;

    /// Pids of all live processes whose command line matches the tracker's
    /// executable signature
    fn tracker_pids(&self) -> Vec<u32>;
}

/// Live process table for the current host
#[derive(Debug, Default)]
pub struct SystemProcessTable;

/// Command-line signature of a foreground tracking loop
const TRACKER_BIN: &str = "wtt";
const TRACKER_SUBCOMMAND: &str = "start";

impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        // kill with signal 0 probes existence without delivering anything
        if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to another user
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<()> {
        let signum = match signal {
            Signal::Interrupt => libc::SIGINT,
            Signal::Kill => libc::SIGKILL,
        };

        let rc = unsafe { libc::kill(pid as libc::pid_t, signum) };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // Already gone counts as terminated
            return Ok(());
        }
        Err(WttError::SignalFailure { pid, source: err })
    }

    fn tracker_pids(&self) -> Vec<u32> {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessRefreshKind::new().with_cmd(UpdateKind::Always));

        let mut pids: Vec<u32> = sys
            .processes()
            .iter()
            .filter(|(_, process)| {
                let cmd = process.cmd();
                cmd.first()
                    .map(|arg0| {
                        arg0 == TRACKER_BIN || arg0.ends_with(&format!("/{TRACKER_BIN}"))
                    })
                    .unwrap_or(false)
                    && cmd.iter().any(|arg| arg == TRACKER_SUBCOMMAND)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();

        pids.sort_unstable();
        pids
    }
}
