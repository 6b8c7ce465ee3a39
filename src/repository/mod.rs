// src/repository/mod.rs

//! Repository descriptors and lifecycle
//!
//! This module provides functionality for:
//! - Describing a repository (name, backend kind, address, priority, root)
//! - Initializing and updating a repository's local mirror
//! - Checking the mirrored format version against what this build supports
//! - Running updates over many repositories with precedence and parallelism

pub mod state;

use crate::backend::{self, Download};
use crate::config;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::graph::executor::{ExecutionError, Executor};
use crate::graph::DirectedGraph;
use crate::layout;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Newest repository format version this build can read
pub const SUPPORTED_FORMAT: &str = "1.2.0";

/// Format version assumed when a repository carries no version marker
const LEGACY_FORMAT: &str = "1.0.0";

/// An immutable descriptor of one package repository
///
/// Two descriptors compare by priority descending, then by name descending,
/// so sorting a list yields the most-preferred repository first. Equality
/// and hashing follow the same `(priority, name)` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Unique repository name, used as a map/set key
    pub name: String,

    /// Backend kind tag: "local", "http", "git", ...
    pub kind: String,

    /// Resolved location: a filesystem path if it exists on disk, otherwise
    /// an opaque URL
    pub address: String,

    /// Higher priority wins when the same package exists in several
    /// repositories
    pub priority: i32,

    /// Local directory under which the mirrored content lives
    pub root: PathBuf,
}

impl Repository {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        address: impl Into<String>,
        priority: i32,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            address: address.into(),
            priority,
            root: root.into(),
        }
    }

    /// Describe an arbitrary local directory as a repository
    ///
    /// The directory itself serves as both address and root; the name is the
    /// directory's final component.
    pub fn local(dir: &Path) -> Self {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());
        Self {
            name,
            kind: "local".to_string(),
            address: dir.display().to_string(),
            priority: 0,
            root: dir.to_path_buf(),
        }
    }

    /// Render the descriptor as a JSON document
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl PartialEq for Repository {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.name == other.name
    }
}

impl Eq for Repository {}

impl Hash for Repository {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.priority.hash(state);
        self.name.hash(state);
    }
}

impl Ord for Repository {
    fn cmp(&self, other: &Self) -> Ordering {
        // Descending on both keys: the natural sort order puts the
        // highest-priority repository first
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.name.cmp(&self.name))
    }
}

impl PartialOrd for Repository {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.kind, self.address)
    }
}

/// Initialize a repository's local root from scratch
///
/// Destructively resets the root: anything already there is removed. Writes
/// the repository's own config descriptor, creates the empty
/// packages/archives/compilers layout, then hands over to the backend's
/// `pull_repo` for the first sync.
pub fn init(repo: &Repository) -> Result<()> {
    info!("Initializing repository {}", repo);

    filesystem::rm_rf(&repo.root)?;
    filesystem::mkdir_p(&repo.root)?;

    config::write_repo_config(repo)?;
    filesystem::mkdir_p(&layout::packages_dir(repo))?;
    filesystem::mkdir_p(&layout::archives_dir(repo))?;
    filesystem::mkdir_p(&layout::compilers_dir(repo))?;
    filesystem::atomic_write(
        &layout::version_file(repo),
        format!("{}\n", SUPPORTED_FORMAT).as_bytes(),
    )?;

    let backend = backend::resolve(&repo.kind)?;
    backend.pull_repo(repo)?;
    Ok(())
}

/// Update a repository's local mirror
///
/// Runs the backend's `pull_repo`, then refuses to proceed if the mirrored
/// repository declares a newer format than this build supports. On success
/// the update stamp is refreshed.
pub fn update(repo: &Repository) -> Result<()> {
    info!("Updating repository {}", repo);

    let backend = backend::resolve(&repo.kind)?;
    backend.pull_repo(repo)?;

    check_format_version(repo)?;

    filesystem::atomic_write(
        &layout::update_stamp(repo),
        format!("{}\n", chrono::Utc::now().to_rfc3339()).as_bytes(),
    )?;
    Ok(())
}

/// Fetch a package's prebuilt source archive, if the repository hosts one
pub fn pull_archive(repo: &Repository, package: &str) -> Result<Download<PathBuf>> {
    let backend = backend::resolve(&repo.kind)?;
    backend.pull_archive(repo, &layout::package_archive(repo, package))
}

/// Report the backend-specific revision marker of the mirrored repository
pub fn revision(repo: &Repository) -> Result<Option<String>> {
    let backend = backend::resolve(&repo.kind)?;
    backend.revision(repo)
}

/// Whether the repository's last successful update is older than `max_age_secs`
///
/// A missing or unreadable stamp always counts as stale.
pub fn needs_update(repo: &Repository, max_age_secs: u64) -> bool {
    let stamp = match fs::read_to_string(layout::update_stamp(repo)) {
        Ok(text) => text,
        Err(_) => return true,
    };
    match chrono::DateTime::parse_from_rfc3339(stamp.trim()) {
        Ok(last) => {
            let age = chrono::Utc::now().signed_duration_since(last);
            max_age_secs == 0 || age.num_seconds() < 0 || age.num_seconds() as u64 > max_age_secs
        }
        // Unparsable stamp: force an update rather than trusting it
        Err(_) => true,
    }
}

/// Update every repository in a precedence graph
///
/// Edges mean "must be updated before"; independent repositories run
/// concurrently, bounded by `jobs`. A failed repository only prevents its
/// transitive successors from running; everything else continues. The call
/// succeeds only if every update succeeded.
pub fn update_all(graph: &DirectedGraph<Repository>, jobs: usize) -> Result<()> {
    let executor = Executor::new(jobs);
    match executor.run(graph, update) {
        Ok(()) => Ok(()),
        Err(ExecutionError::Cycle(components)) => {
            let rendered = components
                .iter()
                .map(|component| {
                    component
                        .iter()
                        .map(|r| r.name.as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                })
                .collect::<Vec<_>>()
                .join("; ");
            Err(Error::CyclicPrecedence(rendered))
        }
        Err(ExecutionError::Failures(report)) => {
            for (repo, err) in &report.failed {
                warn!("Update of {} failed: {}", repo, err);
            }
            Err(Error::SyncFailed {
                failed: report.failed.iter().map(|(r, _)| r.name.clone()).collect(),
                skipped: report.skipped.iter().map(|r| r.name.clone()).collect(),
            })
        }
    }
}

/// Compare the mirrored repository's declared format version against ours
fn check_format_version(repo: &Repository) -> Result<()> {
    let supported =
        Version::parse(SUPPORTED_FORMAT).expect("SUPPORTED_FORMAT is a valid semver string");
    let declared = declared_format_version(repo)?;

    if declared > supported {
        return Err(Error::IncompatibleVersion {
            repository: repo.name.clone(),
            declared,
            supported,
        });
    }
    Ok(())
}

fn declared_format_version(repo: &Repository) -> Result<Version> {
    let legacy = Version::parse(LEGACY_FORMAT).expect("LEGACY_FORMAT is a valid semver string");
    let path = layout::version_file(repo);
    if !path.exists() {
        debug!(
            "Repository {} has no version marker, assuming legacy format {}",
            repo.name, legacy
        );
        return Ok(legacy);
    }

    let text = fs::read_to_string(&path)?;
    match Version::parse(text.trim()) {
        Ok(version) => Ok(version),
        Err(e) => {
            warn!(
                "Repository {} has an unparsable version marker ({}), assuming legacy format {}",
                repo.name, e, legacy
            );
            Ok(legacy)
        }
    }
}
