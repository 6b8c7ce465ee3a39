// src/backend/git.rs

//! Git backend
//!
//! Shells out to the system `git` binary, which transparently picks up SSH
//! keys, credential helpers, and anything else configured in ~/.gitconfig.
//! A repository is synced by fetching into an in-place checkout under its
//! root and hard-resetting to the fetched head; untracked files (the local
//! config, update stamp) survive the reset.

use crate::backend::{Artifact, Backend, Download};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::repository::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

pub struct GitBackend;

/// Run a git subcommand in `dir`, capturing stdout
fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .map_err(|e| Error::Download(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Download(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl GitBackend {
    /// Bring the checkout at `dir` up to date with `address`
    ///
    /// `git clone` refuses non-empty directories, and the root already holds
    /// the repository config, so the checkout is built in place:
    /// init + remote add on first sync, then fetch + hard reset every time.
    fn sync_checkout(&self, dir: &Path, address: &str) -> Result<()> {
        filesystem::mkdir_p(dir)?;

        if dir.join(".git").exists() {
            // Keep the remote current in case the address changed
            git(dir, &["remote", "set-url", "origin", address])?;
        } else {
            git(dir, &["init", "--quiet"])?;
            git(dir, &["remote", "add", "origin", address])?;
        }

        git(dir, &["fetch", "--quiet", "--force", "origin", "HEAD"])?;
        git(dir, &["reset", "--hard", "--quiet", "FETCH_HEAD"])?;
        debug!("Synced git checkout at {}", dir.display());
        Ok(())
    }
}

impl Backend for GitBackend {
    fn pull_url(
        &self,
        package: &str,
        local_dir: &Path,
        remote_url: &str,
    ) -> Result<Download<Artifact>> {
        let dest = local_dir.join(package);
        match self.sync_checkout(&dest, remote_url) {
            Ok(()) => Ok(Download::Fresh(Artifact::Directory(dest))),
            Err(e) => {
                warn!("git fetch of {} failed: {}", remote_url, e);
                Ok(Download::Unavailable)
            }
        }
    }

    fn pull_repo(&self, repo: &Repository) -> Result<()> {
        self.sync_checkout(&repo.root, &repo.address)
    }

    fn pull_archive(&self, _repo: &Repository, _target: &Path) -> Result<Download<PathBuf>> {
        // Git repositories host no prebuilt archives
        Ok(Download::Unavailable)
    }

    fn revision(&self, repo: &Repository) -> Result<Option<String>> {
        if !repo.root.join(".git").exists() {
            return Ok(None);
        }
        let head = git(&repo.root, &["rev-parse", "HEAD"])?;
        Ok(Some(head.trim().to_string()))
    }
}
