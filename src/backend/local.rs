// src/backend/local.rs

//! Local-filesystem backend
//!
//! The repository address is a directory on disk; syncing copies its
//! packages/compilers/archives subtrees under the local root. Useful for
//! file:// mirrors and for tests.

use crate::backend::{Artifact, Backend, Download};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::layout;
use crate::repository::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalBackend;

/// Destination file name for a fetched artifact
fn artifact_name<'a>(source: &'a Path, package: &'a str) -> &'a str {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(package)
}

impl Backend for LocalBackend {
    fn pull_url(
        &self,
        package: &str,
        local_dir: &Path,
        remote_url: &str,
    ) -> Result<Download<Artifact>> {
        let source = Path::new(remote_url);
        if !source.exists() {
            debug!("Local source {} does not exist", source.display());
            return Ok(Download::Unavailable);
        }

        let dest = local_dir.join(artifact_name(source, package));
        if source.is_dir() {
            filesystem::replace_tree(source, &dest)?;
            return Ok(Download::Fresh(Artifact::Directory(dest)));
        }

        if dest.is_file()
            && filesystem::sha256_digest(&dest)? == filesystem::sha256_digest(source)?
        {
            debug!("{} is already current", dest.display());
            return Ok(Download::UpToDate(Artifact::File(dest)));
        }

        filesystem::mkdir_p(local_dir)?;
        fs::copy(source, &dest)?;
        Ok(Download::Fresh(Artifact::File(dest)))
    }

    fn pull_repo(&self, repo: &Repository) -> Result<()> {
        let source = Path::new(&repo.address);
        if !source.is_dir() {
            return Err(Error::Download(format!(
                "local repository source {} does not exist",
                source.display()
            )));
        }

        for subdir in [
            layout::PACKAGES_DIR,
            layout::COMPILERS_DIR,
            layout::ARCHIVES_DIR,
        ] {
            let from = source.join(subdir);
            if from.is_dir() {
                filesystem::replace_tree(&from, &repo.root.join(subdir))?;
            }
            // A subtree absent upstream leaves the local layout untouched
        }

        let version = source.join(layout::VERSION_FILE);
        if version.is_file() {
            filesystem::atomic_write(&layout::version_file(repo), &fs::read(&version)?)?;
        }

        debug!("Mirrored {} into {}", source.display(), repo.root.display());
        Ok(())
    }

    fn pull_archive(&self, repo: &Repository, target: &Path) -> Result<Download<PathBuf>> {
        let name = match target.file_name() {
            Some(name) => name,
            None => return Ok(Download::Unavailable),
        };
        let source = Path::new(&repo.address)
            .join(layout::ARCHIVES_DIR)
            .join(name);
        if !source.is_file() {
            return Ok(Download::Unavailable);
        }

        if target.is_file()
            && filesystem::sha256_digest(target)? == filesystem::sha256_digest(&source)?
        {
            return Ok(Download::UpToDate(target.to_path_buf()));
        }

        if let Some(parent) = target.parent() {
            filesystem::mkdir_p(parent)?;
        }
        fs::copy(&source, target)?;
        Ok(Download::Fresh(target.to_path_buf()))
    }

    fn revision(&self, _repo: &Repository) -> Result<Option<String>> {
        // Plain directories have no revision marker
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn upstream_with_package(dir: &Path) -> PathBuf {
        let upstream = dir.join("upstream");
        fs::create_dir_all(upstream.join("packages/foo.1.0")).unwrap();
        fs::write(
            upstream.join("packages/foo.1.0/manifest.json"),
            b"{\"name\": \"foo\"}",
        )
        .unwrap();
        fs::create_dir_all(upstream.join("archives")).unwrap();
        fs::write(upstream.join("archives/foo.1.0.tar.gz"), b"tarball").unwrap();
        upstream
    }

    #[test]
    fn test_pull_url_missing_source_is_unavailable() {
        let dir = tempdir().unwrap();
        let result = LocalBackend
            .pull_url("foo", dir.path(), "/no/such/file")
            .unwrap();
        assert!(result.is_unavailable());
    }

    #[test]
    fn test_pull_url_copies_then_short_circuits() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("foo-1.0.tar.gz");
        fs::write(&source, b"contents").unwrap();
        let dest_dir = dir.path().join("downloads");
        fs::create_dir_all(&dest_dir).unwrap();

        let first = LocalBackend
            .pull_url("foo", &dest_dir, source.to_str().unwrap())
            .unwrap();
        assert!(matches!(first, Download::Fresh(Artifact::File(_))));

        let second = LocalBackend
            .pull_url("foo", &dest_dir, source.to_str().unwrap())
            .unwrap();
        assert!(matches!(second, Download::UpToDate(Artifact::File(_))));
    }

    #[test]
    fn test_pull_repo_mirrors_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let upstream = upstream_with_package(dir.path());
        let repo = Repository::new(
            "test",
            "local",
            upstream.to_str().unwrap(),
            0,
            dir.path().join("mirror"),
        );
        fs::create_dir_all(&repo.root).unwrap();

        LocalBackend.pull_repo(&repo).unwrap();
        let manifest = repo.root.join("packages/foo.1.0/manifest.json");
        assert!(manifest.is_file());
        let digest = filesystem::sha256_digest(&manifest).unwrap();

        LocalBackend.pull_repo(&repo).unwrap();
        assert_eq!(filesystem::sha256_digest(&manifest).unwrap(), digest);
    }

    #[test]
    fn test_pull_repo_missing_source_fails() {
        let dir = tempdir().unwrap();
        let repo = Repository::new("test", "local", "/no/such/dir", 0, dir.path().join("m"));
        assert!(LocalBackend.pull_repo(&repo).is_err());
    }

    #[test]
    fn test_pull_archive() {
        let dir = tempdir().unwrap();
        let upstream = upstream_with_package(dir.path());
        let repo = Repository::new(
            "test",
            "local",
            upstream.to_str().unwrap(),
            0,
            dir.path().join("mirror"),
        );

        let target = layout::package_archive(&repo, "foo.1.0");
        let first = LocalBackend.pull_archive(&repo, &target).unwrap();
        assert_eq!(first, Download::Fresh(target.clone()));

        let second = LocalBackend.pull_archive(&repo, &target).unwrap();
        assert_eq!(second, Download::UpToDate(target.clone()));

        let missing = layout::package_archive(&repo, "bar.2.0");
        assert!(LocalBackend.pull_archive(&repo, &missing).unwrap().is_unavailable());
    }

    #[test]
    fn test_revision_is_none() {
        let dir = tempdir().unwrap();
        let repo = Repository::local(dir.path());
        assert_eq!(LocalBackend.revision(&repo).unwrap(), None);
    }
}
