//! Durable time ledger: per-project, per-date, per-branch accumulated seconds.
//!
//! The ledger is a single JSON document shared by every tracked project on
//! the host. Writes serialize the whole ledger to a temporary file in the
//! same directory and rename it over the canonical path, so an interrupted
//! write never corrupts the previous state. Read-modify-write cycles hold an
//! exclusive advisory lock on a sidecar file so concurrent trackers
//! serialize instead of losing updates.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WttError};

/// Canonical ledger file name inside the base directory
pub const LEDGER_FILE_NAME: &str = "wtt.json";
const TMP_FILE_NAME: &str = "wtt.json.tmp";
const LOCK_FILE_NAME: &str = "wtt.lock";

/// Date key format used throughout the ledger (`28-02-2026`)
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Today's date formatted as a ledger key
pub fn today_key() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

/// Accumulated seconds keyed by project name, then date, then branch name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeLedger {
    pub projects: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl TimeLedger {
    /// Add seconds at the given key path, creating intermediate levels with
    /// a zero seed when absent
    pub fn add(&mut self, project: &str, date: &str, branch: &str, delta_seconds: f64) {
        let entry = self
            .projects
            .entry(project.to_string())
            .or_default()
            .entry(date.to_string())
            .or_default()
            .entry(branch.to_string())
            .or_insert(0.0);
        *entry += delta_seconds;
    }

    /// Stored seconds at a key path, if the path exists
    pub fn seconds_for(&self, project: &str, date: &str, branch: &str) -> Option<f64> {
        self.projects.get(project)?.get(date)?.get(branch).copied()
    }

    /// Whether the ledger holds no projects at all
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Owns the on-disk bytes of the ledger file under a base directory
#[derive(Debug, Clone)]
pub struct LedgerStore {
    base_dir: PathBuf,
}

/// Exclusive advisory lock held for the duration of a read-modify-write
struct HeldLock(File);

impl Drop for HeldLock {
    fn drop(&mut self) {
        let _ = self.0.unlock();
    }
}

impl LedgerStore {
    /// Create a store rooted at the given base directory
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path of the canonical ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.base_dir.join(LEDGER_FILE_NAME)
    }

    fn tmp_path(&self) -> PathBuf {
        self.base_dir.join(TMP_FILE_NAME)
    }

    fn lock_path(&self) -> PathBuf {
        self.base_dir.join(LOCK_FILE_NAME)
    }

    /// Whether a ledger file exists on disk
    pub fn exists(&self) -> bool {
        self.ledger_path().exists()
    }

    /// Create the base directory and an empty ledger file when absent.
    /// No-op when both already exist.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let _lock = self.lock()?;
        self.create_if_absent_locked()?;
        Ok(())
    }

    /// Load the current ledger, creating an empty one first when no backing
    /// file exists. Content that exists but does not parse is a fatal
    /// `CorruptLedger` error, never treated as empty.
    pub fn load(&self) -> Result<TimeLedger> {
        fs::create_dir_all(&self.base_dir)?;
        let _lock = self.lock()?;
        self.load_locked()
    }

    /// Add `delta_seconds` at the (project, date, branch) path and persist.
    ///
    /// The whole read-modify-write runs under the exclusive lock, so
    /// concurrent trackers ticking at once serialize their updates.
    pub fn accumulate(
        &self,
        project: &str,
        date: &str,
        branch: &str,
        delta_seconds: f64,
    ) -> Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let _lock = self.lock()?;
        let mut ledger = self.load_locked()?;
        ledger.add(project, date, branch, delta_seconds);
        self.save(&ledger)
    }

    /// Caller must hold the exclusive lock. Existence is checked under the
    /// lock so a racing first access cannot rename an empty ledger over a
    /// concurrent writer's data.
    fn create_if_absent_locked(&self) -> Result<()> {
        if !self.exists() {
            self.save(&TimeLedger::default())?;
            debug!("created empty ledger at {}", self.ledger_path().display());
        }
        Ok(())
    }

    /// Caller must hold the exclusive lock
    fn load_locked(&self) -> Result<TimeLedger> {
        self.create_if_absent_locked()?;
        let raw = fs::read_to_string(self.ledger_path())?;
        serde_json::from_str(&raw).map_err(WttError::CorruptLedger)
    }

    /// Replace the ledger with an empty one. Fails with `NotInitialized`
    /// when no ledger file exists yet.
    pub fn clear(&self) -> Result<()> {
        if !self.exists() {
            return Err(WttError::NotInitialized);
        }
        let _lock = self.lock()?;
        // Re-checked under the lock; the file may have just been replaced
        if !self.exists() {
            return Err(WttError::NotInitialized);
        }
        self.save(&TimeLedger::default())
    }

    /// Serialize the full ledger to a temp file in the same directory, then
    /// rename it over the canonical path. On failure the temp file is
    /// removed and the canonical file is left untouched.
    fn save(&self, ledger: &TimeLedger) -> Result<()> {
        let tmp = self.tmp_path();
        let json = serde_json::to_string_pretty(ledger)
            .map_err(|e| WttError::PersistFailure(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

        let write_and_rename = (|| {
            fs::write(&tmp, json)?;
            fs::rename(&tmp, self.ledger_path())
        })();

        if let Err(e) = write_and_rename {
            let _ = fs::remove_file(&tmp);
            return Err(WttError::PersistFailure(e));
        }
        Ok(())
    }

    fn lock(&self) -> Result<HeldLock> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        Ok(HeldLock(file))
    }
}

/// Sanitized project key derived from a project directory path
pub fn project_key(project_dir: &Path) -> String {
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown-project".to_string());

    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store() -> (tempfile::TempDir, LedgerStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_load_creates_empty_ledger_on_first_access() {
        let (_dir, store) = store();
        let ledger = store.load().unwrap();
        assert!(ledger.is_empty());
        assert!(store.exists());
    }

    #[test]
    fn test_load_is_idempotent() {
        let (_dir, store) = store();
        store.accumulate("proj", "01-01-2030", "main", 12.5).unwrap();
        let first = store.load().unwrap();
        let second = store.load().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_accumulate_sums_deltas() {
        let (_dir, store) = store();
        store.accumulate("proj", "01-01-2030", "main", 30.0).unwrap();
        store.accumulate("proj", "01-01-2030", "main", 30.0).unwrap();

        let ledger = store.load().unwrap();
        assert_eq!(ledger.seconds_for("proj", "01-01-2030", "main"), Some(60.0));
    }

    #[test]
    fn test_accumulate_seeds_intermediate_levels() {
        let (_dir, store) = store();
        store.accumulate("proj", "02-01-2030", "feature/x", 0.0).unwrap();

        let ledger = store.load().unwrap();
        assert_eq!(ledger.seconds_for("proj", "02-01-2030", "feature/x"), Some(0.0));
    }

    #[test]
    fn test_concurrent_accumulates_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();

        // No backing file yet: the first writers race through the
        // create-if-absent path as well as the read-modify-write
        let mut workers = Vec::new();
        for _ in 0..4 {
            let base = dir.path().to_path_buf();
            workers.push(std::thread::spawn(move || {
                let store = LedgerStore::new(base);
                for _ in 0..25 {
                    store.accumulate("proj", "01-01-2030", "main", 1.0).unwrap();
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        let store = LedgerStore::new(dir.path());
        assert_eq!(
            store.load().unwrap().seconds_for("proj", "01-01-2030", "main"),
            Some(100.0)
        );
    }

    #[test]
    fn test_round_trip_is_fixed_point() {
        let (_dir, store) = store();
        store.accumulate("a", "01-01-2030", "main", 1.5).unwrap();
        store.accumulate("b", "02-01-2030", "dev", 2.0).unwrap();

        let loaded = store.load().unwrap();
        store.save(&loaded).unwrap();
        assert_eq!(store.load().unwrap(), loaded);
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let (_dir, store) = store();
        store.accumulate("proj", "01-01-2030", "main", 30.0).unwrap();
        store.clear().unwrap();

        let ledger = store.load().unwrap();
        assert!(ledger.is_empty());
        // The file is reset, not deleted
        assert!(store.exists());
    }

    #[test]
    fn test_clear_without_store_is_not_initialized() {
        let (_dir, store) = store();
        assert!(matches!(store.clear(), Err(WttError::NotInitialized)));
    }

    #[test]
    fn test_corrupt_content_is_fatal() {
        let (_dir, store) = store();
        store.init().unwrap();
        fs::write(store.ledger_path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(WttError::CorruptLedger(_))));
    }

    #[test]
    fn test_empty_file_is_fatal_not_empty_ledger() {
        let (_dir, store) = store();
        store.init().unwrap();
        fs::write(store.ledger_path(), "").unwrap();

        assert!(matches!(store.load(), Err(WttError::CorruptLedger(_))));
    }

    #[test]
    fn test_reads_compact_and_pretty_serializations() {
        let (_dir, store) = store();
        store.init().unwrap();

        fs::write(
            store.ledger_path(),
            r#"{"projects":{"proj":{"01-01-2030":{"main":42}}}}"#,
        )
        .unwrap();
        let compact = store.load().unwrap();
        assert_eq!(compact.seconds_for("proj", "01-01-2030", "main"), Some(42.0));

        store.save(&compact).unwrap();
        let pretty = store.load().unwrap();
        assert_eq!(pretty, compact);
    }

    #[test]
    fn test_stale_temp_file_does_not_affect_canonical_state() {
        let (dir, store) = store();
        store.accumulate("proj", "01-01-2030", "main", 10.0).unwrap();
        let before = fs::read_to_string(store.ledger_path()).unwrap();

        // Simulate a writer that died before the rename step
        fs::write(dir.path().join(TMP_FILE_NAME), "{\"projects\": garbage").unwrap();

        let after = fs::read_to_string(store.ledger_path()).unwrap();
        assert_eq!(before, after);
        assert_eq!(
            store.load().unwrap().seconds_for("proj", "01-01-2030", "main"),
            Some(10.0)
        );
    }

    #[test]
    fn test_save_failure_leaves_canonical_untouched() {
        let (_dir, store) = store();
        store.accumulate("proj", "01-01-2030", "main", 10.0).unwrap();
        let before = fs::read_to_string(store.ledger_path()).unwrap();

        // A store pointed at a missing directory cannot write its temp file
        let broken = LedgerStore::new(store.base_dir.join("missing").join("deeper"));
        let mut ledger = store.load().unwrap();
        ledger.add("proj", "01-01-2030", "main", 99.0);
        assert!(matches!(
            broken.save(&ledger),
            Err(WttError::PersistFailure(_))
        ));

        assert_eq!(fs::read_to_string(store.ledger_path()).unwrap(), before);
    }

    #[test]
    fn test_project_key_sanitizes_basename() {
        assert_eq!(project_key(Path::new("/home/me/my project!")), "my-project-");
        assert_eq!(project_key(Path::new("/home/me/wtt_v2.0")), "wtt_v2.0");
    }
}
