//! Working copy management: clone when missing, commit and push fixes,
//! remove copies this process created.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};

use crate::error::{FixloopError, Result};

/// Result of `commit_and_push`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    Pushed,
    NoChanges,
}

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    repo_url: Option<String>,
    cloned_by_us: bool,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>, repo_url: Option<String>) -> Self {
        Self {
            path: path.into(),
            repo_url,
            cloned_by_us: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cloned_by_us(&self) -> bool {
        self.cloned_by_us
    }

    /// Make sure the working copy exists.
    ///
    /// With `clean`, an existing copy is removed first, but only when a URL
    /// is available to clone it again.
    pub fn prepare(&mut self, clean: bool) -> Result<()> {
        if clean && self.path.exists() {
            if self.repo_url.is_some() {
                info!("Removing working copy {}", self.path.display());
                fs::remove_dir_all(&self.path).map_err(|e| {
                    FixloopError::Workspace(format!("Failed to remove {}: {}", self.path.display(), e))
                })?;
            } else {
                warn!(
                    "--clean ignored for {}: no repository URL to clone it again",
                    self.path.display()
                );
            }
        }

        if self.path.is_dir() {
            info!("Using existing working copy {}", self.path.display());
            return Ok(());
        }

        let Some(url) = &self.repo_url else {
            return Err(FixloopError::Workspace(format!(
                "Working copy {} does not exist and no repository URL was given",
                self.path.display()
            )));
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| FixloopError::Workspace(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        info!("Cloning {} into {}", url, self.path.display());
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(&self.path)
            .output()
            .map_err(|e| FixloopError::Workspace(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FixloopError::Workspace(format!("Failed to clone {}: {}", url, stderr.trim())));
        }

        self.cloned_by_us = true;
        Ok(())
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| FixloopError::Workspace(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FixloopError::Workspace(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Stage everything, commit with `message` and push the current branch
    pub fn commit_and_push(&self, message: &str) -> Result<CommitResult> {
        self.git(&["add", "-A"])?;

        if self.git(&["status", "--porcelain"])?.trim().is_empty() {
            info!("No changes to commit in {}", self.path.display());
            return Ok(CommitResult::NoChanges);
        }

        self.git(&["commit", "-m", message])?;
        self.git(&["push"])?;
        info!("Committed and pushed: {}", message);
        Ok(CommitResult::Pushed)
    }

    /// Remove the working copy if this process cloned it
    pub fn cleanup(self) -> Result<()> {
        if !self.cloned_by_us || !self.path.exists() {
            return Ok(());
        }
        info!("Removing cloned working copy {}", self.path.display());
        fs::remove_dir_all(&self.path)
            .map_err(|e| FixloopError::Workspace(format!("Failed to remove {}: {}", self.path.display(), e)))
    }
}
