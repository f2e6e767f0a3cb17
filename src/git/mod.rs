pub mod diff;

pub use diff::{parse_head_diff, patch_for, FilePatch, HunkRange, Side};

use anyhow::{Context, Result};
use std::process::Command;

/// Fast local source for commit metadata, tried before any remote query
pub trait LocalVcs {
    /// One-line (subject) message of a commit, or failure when the object
    /// is not available locally
    fn commit_message(&self, sha: &str) -> Result<String>;
}

/// `LocalVcs` backed by the git CLI in a checked-out repo
pub struct GitCli {
    repo_root: String,
}

impl GitCli {
    pub fn new(repo_root: impl Into<String>) -> Self {
        GitCli {
            repo_root: repo_root.into(),
        }
    }
}

impl LocalVcs for GitCli {
    fn commit_message(&self, sha: &str) -> Result<String> {
        let output = Command::new("git")
            .args(["log", "-1", "--format=%s", sha])
            .current_dir(&self.repo_root)
            .output()
            .context("Failed to run git log")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Commit {} not found locally: {}", sha, stderr.trim());
        }

        let subject = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if subject.is_empty() {
            anyhow::bail!("Commit {} has no message", sha);
        }
        Ok(subject)
    }
}
