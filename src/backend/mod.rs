// src/backend/mod.rs

//! Pluggable repository transports
//!
//! This module provides:
//! - The `Backend` trait every transport implements
//! - The `Download`/`Artifact` result types all fetch operations share
//! - A process-wide registry mapping a kind tag to its implementation
//!
//! Registration is expected to complete during single-threaded startup,
//! before any concurrent update begins; afterwards the registry is
//! read-only. Re-registering a kind replaces the previous backend.

pub mod git;
pub mod http;
pub mod local;

use crate::error::{Error, Result};
use crate::repository::Repository;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, RwLock};
use tracing::debug;

/// A file or directory produced by a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    File(PathBuf),
    Directory(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::File(path) | Artifact::Directory(path) => path,
        }
    }
}

/// The outcome of any fetch operation
///
/// `Unavailable` is a normal result, not an error: callers decide whether a
/// missing remote artifact is "nothing to do" or worth a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download<T> {
    /// Newly retrieved content
    Fresh(T),

    /// The local copy was already current; nothing was transferred
    UpToDate(T),

    /// The remote artifact could not be retrieved
    Unavailable,
}

impl<T> Download<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Download<U> {
        match self {
            Download::Fresh(v) => Download::Fresh(f(v)),
            Download::UpToDate(v) => Download::UpToDate(f(v)),
            Download::Unavailable => Download::Unavailable,
        }
    }

    /// The fetched content, if any
    pub fn contents(&self) -> Option<&T> {
        match self {
            Download::Fresh(v) | Download::UpToDate(v) => Some(v),
            Download::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Download::Unavailable)
    }
}

/// Capability contract every transport implements
pub trait Backend: Send + Sync {
    /// Fetch a single named artifact for `package` into `local_dir`
    fn pull_url(
        &self,
        package: &str,
        local_dir: &Path,
        remote_url: &str,
    ) -> Result<Download<Artifact>>;

    /// Synchronize the repository's mirrored tree under its local root
    ///
    /// Idempotent: re-running with nothing changed leaves the tree unchanged.
    fn pull_repo(&self, repo: &Repository) -> Result<()>;

    /// Fetch the repository's prebuilt source archive into `target`, if the
    /// repository hosts one
    fn pull_archive(&self, repo: &Repository, target: &Path) -> Result<Download<PathBuf>>;

    /// Backend-specific revision marker (e.g. a commit id), if the transport
    /// has a notion of revisions
    fn revision(&self, repo: &Repository) -> Result<Option<String>>;
}

static BACKENDS: LazyLock<RwLock<HashMap<String, Arc<dyn Backend>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a backend implementation for a kind tag
///
/// Last registration wins; replacing an existing kind is not an error.
pub fn register(kind: &str, backend: Arc<dyn Backend>) {
    debug!("Registering backend for kind '{}'", kind);
    BACKENDS
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .insert(kind.to_string(), backend);
}

/// Resolve the backend registered for a kind tag
///
/// The kind may come from a repository's own descriptor or from an explicit
/// override (a package can pin a different transport than its repository).
pub fn resolve(kind: &str) -> Result<Arc<dyn Backend>> {
    BACKENDS
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(kind)
        .cloned()
        .ok_or_else(|| Error::UnknownBackend(kind.to_string()))
}

/// Install the built-in `local`, `http`, and `git` backends
pub fn register_defaults() -> Result<()> {
    register("local", Arc::new(local::LocalBackend));
    register("http", Arc::new(http::HttpBackend::new()?));
    register("git", Arc::new(git::GitBackend));
    Ok(())
}
