// src/config.rs

//! On-disk config persistence
//!
//! Two JSON documents are managed here:
//! - `repo.json`: a repository's own descriptor, written into its root
//! - `source.json`: a package's upstream source descriptor, recording the
//!   URL to fetch, an optional backend-kind override, and the checksum the
//!   fetched file is expected to have

use crate::error::Result;
use crate::filesystem;
use crate::layout;
use crate::repository::Repository;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A package's upstream source descriptor
///
/// The `kind` field lets a single package pin a different backend than its
/// owning repository, e.g. a git-sourced package inside an HTTP repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Where to fetch the package source from
    pub url: String,

    /// Backend kind override; defaults to the owning repository's kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Expected checksum of the fetched file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Write a repository's descriptor into its root as `repo.json`
pub fn write_repo_config(repo: &Repository) -> Result<()> {
    let json = serde_json::to_vec_pretty(repo)?;
    filesystem::atomic_write(&layout::repo_config(repo), &json)
}

/// Read a repository descriptor back from a `repo.json` file
pub fn read_repo_config(path: &Path) -> Result<Repository> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read the source descriptor at `path`
pub fn read_source_spec(path: &Path) -> Result<SourceSpec> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Write a source descriptor to `path` atomically
pub fn write_source_spec(path: &Path, spec: &SourceSpec) -> Result<()> {
    let json = serde_json::to_vec_pretty(spec)?;
    filesystem::atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repo_config_round_trip() {
        let dir = tempdir().unwrap();
        let repo = Repository::new(
            "main",
            "http",
            "https://packages.example.org/main",
            10,
            dir.path().join("main"),
        );

        write_repo_config(&repo).unwrap();
        let read = read_repo_config(&layout::repo_config(&repo)).unwrap();

        assert_eq!(read.name, "main");
        assert_eq!(read.kind, "http");
        assert_eq!(read.address, "https://packages.example.org/main");
        assert_eq!(read.priority, 10);
    }

    #[test]
    fn test_source_spec_round_trip_with_checksum() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.json");
        let spec = SourceSpec {
            url: "https://example.org/foo-1.0.tar.gz".to_string(),
            kind: None,
            checksum: Some("deadbeef".to_string()),
        };

        write_source_spec(&path, &spec).unwrap();
        assert_eq!(read_source_spec(&path).unwrap(), spec);
    }

    #[test]
    fn test_source_spec_optional_fields_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.json");
        fs::write(&path, r#"{"url": "https://example.org/a.tar.gz"}"#).unwrap();

        let spec = read_source_spec(&path).unwrap();
        assert_eq!(spec.url, "https://example.org/a.tar.gz");
        assert!(spec.kind.is_none());
        assert!(spec.checksum.is_none());
    }
}
