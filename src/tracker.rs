//! The background tracking loop: samples the current branch on an interval
//! and accumulates wall-clock deltas into the ledger.
//!
//! State machine: Starting -> Running -> Stopping -> Terminated. Elapsed
//! time is always credited to the branch that was active *during* the
//! interval, not the branch discovered at interval end. A failed sample or
//! ledger write logs and continues; only the shutdown signal ends the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, WttError};
use crate::git::GitWorkspace;
use crate::ledger::{today_key, LedgerStore};
use crate::registry::ProcessRegistry;

/// Lifecycle states of the tracking loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopping,
    Terminated,
}

/// Summary of a finished tracking session
#[derive(Debug, Clone)]
pub struct TrackingSummary {
    /// Branch active when the loop stopped
    pub last_branch: String,
    /// Seconds between the loop start and the final flush
    pub tracked_seconds: f64,
}

/// One long-lived tracking loop for one project
pub struct TrackingLoop {
    config: Arc<Config>,
    store: LedgerStore,
    registry: ProcessRegistry,
    git: GitWorkspace,
    project: String,
}

impl TrackingLoop {
    pub fn new(config: Arc<Config>, git: GitWorkspace, project: String) -> Self {
        let store = LedgerStore::new(&config.base_dir);
        let registry = ProcessRegistry::new(&config.base_dir);
        Self {
            config,
            store,
            registry,
            git,
            project,
        }
    }

    /// Run until the shutdown signal fires. Returns a summary of the
    /// session after the final delta has been flushed and the marker
    /// removed.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<TrackingSummary> {
        let mut state = LoopState::Starting;
        debug!("state: {:?}", state);

        if !self.git.is_git_repository() {
            return Err(WttError::NotAGitRepository);
        }

        let mut branch = self.git.current_branch().await;

        // Zero-second baseline so the branch shows up in filtered views
        // even before the first interval elapses
        self.store
            .accumulate(&self.project, &today_key(), &branch, 0.0)?;

        self.registry.init()?;
        self.registry.register(&self.project, std::process::id())?;

        info!(
            "tracking '{}' on branch '{}' every {}s",
            self.project, branch, self.config.sample_interval_secs
        );

        state = LoopState::Running;
        debug!("state: {:?}", state);

        let started = Instant::now();
        let mut last_sample = Instant::now();
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.sample_interval_secs.max(1)));
        // The first tick completes immediately; consume it so the first
        // real sample covers a full interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    // Wall-clock delta, not interval-nominal, so scheduling
                    // jitter does not lose time
                    let delta = now.duration_since(last_sample).as_secs_f64();
                    last_sample = now;

                    let observed = self.git.current_branch().await;
                    let date = today_key();

                    // Credit the interval to the branch that was active
                    // while it elapsed
                    if let Err(e) = self.store.accumulate(&self.project, &date, &branch, delta) {
                        warn!("failed to record sample: {}", e);
                    }

                    if observed != branch {
                        info!("branch switch: {} -> {}", branch, observed);
                        branch = observed;
                    }
                }
                _ = shutdown_rx.recv() => {
                    state = LoopState::Stopping;
                    debug!("state: {:?}", state);
                    break;
                }
            }
        }

        // Final delta since the last accumulated sample
        let delta = last_sample.elapsed().as_secs_f64();
        if let Err(e) = self
            .store
            .accumulate(&self.project, &today_key(), &branch, delta)
        {
            warn!("failed to flush final sample: {}", e);
        }

        self.registry.deregister(&self.project)?;

        state = LoopState::Terminated;
        debug!("state: {:?}", state);

        Ok(TrackingSummary {
            last_branch: branch,
            tracked_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::UNKNOWN_BRANCH;

    fn test_config(base_dir: &std::path::Path) -> Arc<Config> {
        Arc::new(Config {
            base_dir: base_dir.to_path_buf(),
            sample_interval_secs: 1,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_non_git_directory_is_fatal() {
        let base = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        let tracker = TrackingLoop::new(
            test_config(base.path()),
            GitWorkspace::new(project.path()),
            "proj".to_string(),
        );

        let (_tx, rx) = broadcast::channel(1);
        let result = tracker.run(rx).await;
        assert!(matches!(result, Err(WttError::NotAGitRepository)));
    }

    #[tokio::test]
    async fn test_seed_register_flush_and_cleanup() {
        let base = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        // A bare .git directory is enough for the repository check; branch
        // lookups resolve to the "unknown" sentinel
        std::fs::create_dir(project.path().join(".git")).unwrap();

        let config = test_config(base.path());
        let tracker = TrackingLoop::new(
            config.clone(),
            GitWorkspace::new(project.path()),
            "proj".to_string(),
        );

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { tracker.run(rx).await });

        // Let the loop reach Running, then stop it
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(summary.last_branch, UNKNOWN_BRANCH);

        // Seeded entry exists for today under the sentinel branch
        let store = LedgerStore::new(base.path());
        let ledger = store.load().unwrap();
        let seconds = ledger
            .seconds_for("proj", &today_key(), UNKNOWN_BRANCH)
            .expect("seeded entry missing");
        assert!(seconds >= 0.0);

        // Marker was self-cleaned on termination
        let registry = ProcessRegistry::new(base.path());
        assert!(registry.list_markers().unwrap().is_empty());
    }
}
