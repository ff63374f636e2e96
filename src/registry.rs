//! Marker-file registry for background tracker processes.
//!
//! One marker per tracked project, named `.wtt.<projectKey>.pid` inside the
//! shared base directory, holding the decimal pid as plain text. A marker
//! existing does not guarantee the process is alive; staleness is resolved
//! by the selector, never here.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;

const MARKER_PREFIX: &str = ".wtt.";
const MARKER_SUFFIX: &str = ".pid";

/// Companion log file appended to by detached trackers
pub const LOG_FILE_NAME: &str = ".wtt.log";

/// Owns the marker files under the shared base directory
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    base_dir: PathBuf,
}

impl ProcessRegistry {
    /// Create a registry rooted at the given base directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create the base directory and an empty log file when absent.
    /// No-op otherwise.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let log = self.log_path();
        if !log.exists() {
            fs::write(&log, "")?;
        }
        Ok(())
    }

    /// Deterministic marker path for a project key
    pub fn marker_path(&self, project_key: &str) -> PathBuf {
        self.base_dir
            .join(format!("{MARKER_PREFIX}{project_key}{MARKER_SUFFIX}"))
    }

    /// Path of the shared tracker log file
    pub fn log_path(&self) -> PathBuf {
        self.base_dir.join(LOG_FILE_NAME)
    }

    /// Write `pid` as text to the project's marker, overwriting any prior
    /// value. No validation that the pid refers to a running process.
    pub fn register(&self, project_key: &str, pid: u32) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        fs::write(self.marker_path(project_key), pid.to_string())?;
        debug!("registered {} -> pid {}", project_key, pid);
        Ok(())
    }

    /// Read the pid stored for a project, if a parseable marker exists
    pub fn read_marker(&self, project_key: &str) -> Option<u32> {
        let raw = fs::read_to_string(self.marker_path(project_key)).ok()?;
        raw.trim().parse().ok()
    }

    /// Scan the base directory for markers and parse each stored pid.
    /// Markers whose content does not parse as an integer are skipped.
    pub fn list_markers(&self) -> Result<Vec<(String, u32)>> {
        let mut markers = Vec::new();
        if !self.base_dir.exists() {
            return Ok(markers);
        }

        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(project_key) = marker_project_key(&name) else {
                continue;
            };

            let raw = fs::read_to_string(entry.path())?;
            match raw.trim().parse::<u32>() {
                Ok(pid) => markers.push((project_key.to_string(), pid)),
                Err(_) => warn!("skipping marker {} with unparseable pid", name),
            }
        }

        markers.sort();
        Ok(markers)
    }

    /// Remove the project's marker if present. Missing markers are a no-op.
    pub fn deregister(&self, project_key: &str) -> Result<()> {
        let path = self.marker_path(project_key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("deregistered {}", project_key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every marker file in the base directory
    pub fn deregister_all(&self) -> Result<()> {
        for (project_key, _) in self.list_markers()? {
            self.deregister(&project_key)?;
        }
        Ok(())
    }
}

/// Project key embedded in a marker file name, if the name matches the
/// marker convention
fn marker_project_key(file_name: &str) -> Option<&str> {
    let key = file_name
        .strip_prefix(MARKER_PREFIX)?
        .strip_suffix(MARKER_SUFFIX)?;
    (!key.is_empty()).then_some(key)
}

/// Sanitized project key for the current working directory
pub fn current_project_key() -> String {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    crate::ledger::project_key(&cwd)
}
