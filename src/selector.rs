//! Resolution of "which tracked process do we mean".
//!
//! Candidates come from joining registry markers against the live process
//! table. The policy here is liveness-checked: a marker whose pid is dead is
//! stale and never selectable, but listings still surface it, together with
//! live trackers that have no marker at all.

use std::path::PathBuf;

use inquire::Select;
use tracing::debug;

use crate::error::{Result, WttError};
use crate::process::{ProcessTable, Signal};
use crate::registry::ProcessRegistry;

/// A marker joined with the live process table: the resolved pairing of a
/// pid, its owning project key, and the marker file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    pub pid: u32,
    pub project: String,
    pub marker: PathBuf,
}

/// Full registry/OS cross-reference for display
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    /// Registered and alive
    pub active: Vec<TrackedProcess>,
    /// Registered but the pid is no longer alive
    pub stale: Vec<TrackedProcess>,
    /// Alive tracker processes with no matching marker; owner unknown
    pub unregistered: Vec<u32>,
}

/// What the caller asked to select
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectTarget {
    Project(String),
    Pid(u32),
    Interactive,
}

/// Interactive resolution of an ambiguous candidate set.
/// Seam for tests; the real implementation prompts the terminal.
pub trait Chooser {
    fn choose(&self, candidates: &[TrackedProcess]) -> Result<TrackedProcess>;
}

/// Terminal picker over `project (pid: N)` entries
pub struct InquireChooser;

impl Chooser for InquireChooser {
    fn choose(&self, candidates: &[TrackedProcess]) -> Result<TrackedProcess> {
        let options: Vec<String> = candidates
            .iter()
            .map(|c| format!("{} (pid: {})", c.project, c.pid))
            .collect();

        let selection = Select::new("Select a tracked project:", options.clone())
            .with_help_message("↑↓ to move, Enter to select, Esc to cancel")
            .prompt()
            .map_err(|_| WttError::SelectionCancelled)?;

        let index = options
            .iter()
            .position(|o| *o == selection)
            .ok_or(WttError::SelectionCancelled)?;

        Ok(candidates[index].clone())
    }
}

/// Joins the registry against a process table to resolve stop/kill targets
pub struct ProcessSelector<'a, T: ProcessTable> {
    registry: &'a ProcessRegistry,
    table: &'a T,
}

impl<'a, T: ProcessTable> ProcessSelector<'a, T> {
    pub fn new(registry: &'a ProcessRegistry, table: &'a T) -> Self {
        Self { registry, table }
    }

    /// Selectable candidates: markers whose pid is currently alive
    pub fn candidates(&self) -> Result<Vec<TrackedProcess>> {
        Ok(self.report()?.active)
    }

    /// Cross-reference every marker and every live tracker process
    pub fn report(&self) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();

        for (project, pid) in self.registry.list_markers()? {
            let process = TrackedProcess {
                pid,
                marker: self.registry.marker_path(&project),
                project,
            };
            if self.table.is_alive(pid) {
                report.active.push(process);
            } else {
                debug!("stale marker for {} (pid {})", process.project, pid);
                report.stale.push(process);
            }
        }

        let registered: Vec<u32> = report
            .active
            .iter()
            .chain(report.stale.iter())
            .map(|p| p.pid)
            .collect();
        report.unregistered = self
            .table
            .tracker_pids()
            .into_iter()
            .filter(|pid| !registered.contains(pid))
            .collect();

        Ok(report)
    }

    /// Resolve a selection target to one concrete tracked process.
    ///
    /// Without an explicit target the chooser is always consulted, even for
    /// a single candidate; non-interactive callers pass a project or pid.
    pub fn select(&self, target: SelectTarget, chooser: &dyn Chooser) -> Result<TrackedProcess> {
        let candidates = self.candidates()?;
        if candidates.is_empty() {
            return Err(WttError::NoActiveProcesses);
        }

        match target {
            SelectTarget::Project(name) => candidates
                .into_iter()
                .find(|c| c.project == name)
                .ok_or(WttError::NotFound(name)),
            SelectTarget::Pid(pid) => candidates
                .into_iter()
                .find(|c| c.pid == pid)
                .ok_or_else(|| WttError::NotFound(pid.to_string())),
            SelectTarget::Interactive => chooser.choose(&candidates),
        }
    }

    /// Send a graceful interrupt to the candidate. A pid that already exited
    /// is success; the marker is deregistered either way.
    pub fn terminate(&self, candidate: &TrackedProcess) -> Result<()> {
        self.table.signal(candidate.pid, Signal::Interrupt)?;
        self.registry.deregister(&candidate.project)
    }
}
