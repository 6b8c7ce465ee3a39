// src/backend/http.rs

//! HTTP backend
//!
//! This module provides functionality for:
//! - Fetching a repository's file index (`index.json`) over HTTP
//! - Mirroring every indexed file under the local root, skipping files whose
//!   digest already matches
//! - Downloading individual artifacts with retry and atomic rename

use crate::backend::{Artifact, Backend, Download};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::layout;
use crate::repository::Repository;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// File index an HTTP repository serves at its address root
pub const INDEX_FILE: &str = "index.json";

/// Repository file index (simple JSON document)
#[derive(Debug, Serialize, Deserialize)]
pub struct RepoIndex {
    /// Declared repository format version
    pub version: String,
    pub files: Vec<IndexEntry>,
}

/// One mirrored file: its path relative to the repository root and its digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub checksum: String,
}

/// HTTP backend with retry support
pub struct HttpBackend {
    client: Client,
    max_retries: u32,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Parse a repository address, guaranteeing a trailing slash so joins
    /// stay inside it
    fn base_url(repo: &Repository) -> Result<Url> {
        let address = if repo.address.ends_with('/') {
            repo.address.clone()
        } else {
            format!("{}/", repo.address)
        };
        Url::parse(&address)
            .map_err(|e| Error::Download(format!("Invalid repository address {}: {}", address, e)))
    }

    /// Fetch the repository's file index with retry support
    fn fetch_index(&self, base: &Url) -> Result<RepoIndex> {
        let index_url = base
            .join(INDEX_FILE)
            .map_err(|e| Error::Download(format!("Invalid index URL: {}", e)))?;

        info!("Fetching repository index from {}", index_url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(index_url.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            index_url
                        )));
                    }

                    let index: RepoIndex = response.json().map_err(|e| {
                        Error::Download(format!("Failed to parse index JSON: {}", e))
                    })?;

                    info!("Fetched index listing {} files", index.files.len());
                    return Ok(index);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "Failed to fetch index after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Index fetch attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Download a URL to the specified path with retry support
    ///
    /// A 404/410 response is reported as `Unavailable`; other non-success
    /// statuses are errors. The body is written to a temporary file and
    /// renamed into place.
    fn download(&self, url: &Url, dest_path: &Path) -> Result<Download<PathBuf>> {
        debug!("Downloading {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url.clone()).send() {
                Ok(mut response) => {
                    if matches!(
                        response.status(),
                        StatusCode::NOT_FOUND | StatusCode::GONE
                    ) {
                        debug!("{} is not served ({})", url, response.status());
                        return Ok(Download::Unavailable);
                    }
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    // Write to temporary file first, then atomic rename
                    let temp_path = dest_path.with_extension("tmp");
                    let mut file = File::create(&temp_path)?;
                    io::copy(&mut response, &mut file)?;
                    fs::rename(&temp_path, dest_path)?;

                    debug!("Successfully downloaded to {}", dest_path.display());
                    return Ok(Download::Fresh(dest_path.to_path_buf()));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Join an index-relative path under the repository root, rejecting entries
/// that would escape it
fn safe_join(root: &Path, rel: &str) -> Option<PathBuf> {
    let rel = Path::new(rel);
    if rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Some(root.join(rel))
    } else {
        None
    }
}

impl Backend for HttpBackend {
    fn pull_url(
        &self,
        package: &str,
        local_dir: &Path,
        remote_url: &str,
    ) -> Result<Download<Artifact>> {
        let url = Url::parse(remote_url)
            .map_err(|e| Error::Download(format!("Invalid URL {}: {}", remote_url, e)))?;

        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or(package)
            .to_string();

        filesystem::mkdir_p(local_dir)?;
        let result = self.download(&url, &local_dir.join(name))?;
        Ok(result.map(Artifact::File))
    }

    fn pull_repo(&self, repo: &Repository) -> Result<()> {
        let base = Self::base_url(repo)?;
        let index = self.fetch_index(&base)?;

        let mut fetched = 0usize;
        for entry in &index.files {
            let dest = match safe_join(&repo.root, &entry.path) {
                Some(dest) => dest,
                None => {
                    warn!("Index entry '{}' escapes the repository root, skipping", entry.path);
                    continue;
                }
            };

            if dest.is_file() && filesystem::sha256_digest(&dest)? == entry.checksum {
                continue;
            }

            let url = base
                .join(&entry.path)
                .map_err(|e| Error::Download(format!("Invalid index path {}: {}", entry.path, e)))?;
            match self.download(&url, &dest)? {
                Download::Unavailable => {
                    warn!("Indexed file {} is not served, skipping", entry.path)
                }
                _ => fetched += 1,
            }
        }

        filesystem::atomic_write(
            &layout::version_file(repo),
            format!("{}\n", index.version).as_bytes(),
        )?;

        info!(
            "Synchronized {} ({} of {} files transferred)",
            repo.name,
            fetched,
            index.files.len()
        );
        Ok(())
    }

    fn pull_archive(&self, repo: &Repository, target: &Path) -> Result<Download<PathBuf>> {
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::Download(format!("Invalid archive target {}", target.display()))
            })?;

        let base = Self::base_url(repo)?;
        let url = base
            .join(&format!("{}/{}", layout::ARCHIVES_DIR, name))
            .map_err(|e| Error::Download(format!("Invalid archive URL: {}", e)))?;
        self.download(&url, target)
    }

    fn revision(&self, _repo: &Repository) -> Result<Option<String>> {
        // Plain HTTP mirrors have no revision marker
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join_rejects_escapes() {
        let root = Path::new("/srv/mirror");
        assert_eq!(
            safe_join(root, "packages/foo/manifest.json"),
            Some(root.join("packages/foo/manifest.json"))
        );
        assert_eq!(safe_join(root, "../outside"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
    }

    #[test]
    fn test_base_url_gains_trailing_slash() {
        let repo = Repository::new(
            "main",
            "http",
            "https://packages.example.org/main",
            0,
            "/srv/mirror/main",
        );
        let base = HttpBackend::base_url(&repo).unwrap();
        assert_eq!(base.as_str(), "https://packages.example.org/main/");

        let joined = base.join("packages/foo/manifest.json").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://packages.example.org/main/packages/foo/manifest.json"
        );
    }

    #[test]
    fn test_index_parses() {
        let index: RepoIndex = serde_json::from_str(
            r#"{
                "version": "1.2.0",
                "files": [
                    {"path": "packages/foo.1.0/manifest.json", "checksum": "abc"},
                    {"path": "version", "checksum": "def"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(index.version, "1.2.0");
        assert_eq!(index.files.len(), 2);
        assert_eq!(index.files[0].path, "packages/foo.1.0/manifest.json");
    }
}
