//! Thin git collaborator: branch detection only.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

/// Sentinel branch name returned when the branch cannot be determined
pub const UNKNOWN_BRANCH: &str = "unknown";

/// Branch lookups for one project directory
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    project_dir: PathBuf,
}

impl GitWorkspace {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Whether the project directory is a git repository
    pub fn is_git_repository(&self) -> bool {
        self.project_dir.join(".git").exists()
    }

    /// Current branch name, or `"unknown"` on any internal error. Never
    /// fails the caller; mid-rebase and detached-HEAD states are tolerated.
    pub async fn current_branch(&self) -> String {
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(&self.project_dir)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let branch = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if branch.is_empty() {
                    UNKNOWN_BRANCH.to_string()
                } else {
                    branch
                }
            }
            Ok(out) => {
                debug!(
                    "git rev-parse failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                UNKNOWN_BRANCH.to_string()
            }
            Err(e) => {
                debug!("could not run git: {}", e);
                UNKNOWN_BRANCH.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!GitWorkspace::new(dir.path()).is_git_repository());
    }

    #[test]
    fn test_dot_git_directory_marks_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert!(GitWorkspace::new(dir.path()).is_git_repository());
    }

    #[tokio::test]
    async fn test_branch_outside_repository_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = GitWorkspace::new(dir.path());
        assert_eq!(workspace.current_branch().await, UNKNOWN_BRANCH);
    }
}
