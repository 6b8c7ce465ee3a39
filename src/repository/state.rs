// src/repository/state.rs

//! File-state tracking
//!
//! Computes the set of (path, digest) pairs over the files that define a
//! package or a compiler. Comparing two such sets detects "nothing changed"
//! conditions across an update, so redundant rebuild or re-download work can
//! be skipped. Missing files contribute no entries; they are never errors.

use crate::error::Result;
use crate::filesystem;
use crate::layout;
use crate::repository::Repository;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which of a package's files participate in a state computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    /// Manifest, description, source descriptor, auxiliary files, archive
    All,

    /// Only what re-fetching depends on: the source descriptor and the
    /// auxiliary files, plus the archive when `archive` is set
    Partial { archive: bool },
}

/// An unordered set of (path, content-digest) pairs
///
/// Deterministic for a given on-disk state; two states compare equal iff
/// they contain exactly the same entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    entries: BTreeSet<(PathBuf, String)>,
}

impl FileState {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.entries.iter().any(|(p, _)| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PathBuf, String)> {
        self.entries.iter()
    }

    /// Record one file's digest; a missing file contributes nothing
    fn add_file(&mut self, path: &Path) -> Result<()> {
        if path.is_file() {
            let digest = filesystem::sha256_digest(path)?;
            self.entries.insert((path.to_path_buf(), digest));
        }
        Ok(())
    }

    /// Record every file under a directory, recursively
    fn add_dir(&mut self, dir: &Path) -> Result<()> {
        let files = filesystem::files_under(dir)?;
        for (path, digest) in filesystem::digest_files(&files)? {
            self.entries.insert((path, digest));
        }
        Ok(())
    }
}

/// Checksum state of the files defining one package
pub fn package_state(
    repo: &Repository,
    prefix: Option<&str>,
    package: &str,
    scope: StateScope,
) -> Result<FileState> {
    let mut state = FileState::default();

    if matches!(scope, StateScope::All) {
        state.add_file(&layout::package_manifest(repo, prefix, package))?;
        state.add_file(&layout::package_description(repo, prefix, package))?;
    }
    state.add_file(&layout::package_source(repo, prefix, package))?;
    state.add_dir(&layout::package_files_dir(repo, prefix, package))?;

    let with_archive = match scope {
        StateScope::All => true,
        StateScope::Partial { archive } => archive,
    };
    if with_archive {
        state.add_file(&layout::package_archive(repo, package))?;
    }
    Ok(state)
}

/// Checksum state of the files defining one compiler
pub fn compiler_state(
    repo: &Repository,
    prefix: Option<&str>,
    compiler: &str,
) -> Result<FileState> {
    let mut state = FileState::default();
    state.add_file(&layout::compiler_description(repo, prefix, compiler))?;
    state.add_file(&layout::compiler_def(repo, prefix, compiler))?;
    Ok(state)
}

/// Enumerate the packages mirrored in a repository
///
/// Repositories may shard entries into subdirectories by an arbitrary prefix
/// scheme; each result pairs the identifier with the prefix it was found
/// under, so later lookups address the exact same path.
pub fn packages(repo: &Repository) -> Result<Vec<(Option<String>, String)>> {
    scan(&layout::packages_dir(repo), |dir, _name| {
        dir.join(layout::MANIFEST_FILE).is_file()
    })
}

/// Enumerate the compilers mirrored in a repository
pub fn compilers(repo: &Repository) -> Result<Vec<(Option<String>, String)>> {
    scan(&layout::compilers_dir(repo), |dir, name| {
        dir.join(format!("{}.json", name)).is_file()
    })
}

/// Recover the prefix segment of a package directory
///
/// Strips the repository's packages root and the package's own directory
/// name; what remains, if anything, is the prefix.
pub fn extract_prefix(repo: &Repository, dir: &Path, package: &str) -> Option<String> {
    let rel = dir.strip_prefix(layout::packages_dir(repo)).ok()?;
    if rel.file_name()? != std::ffi::OsStr::new(package) {
        return None;
    }
    let prefix = rel.parent()?;
    if prefix.as_os_str().is_empty() {
        None
    } else {
        Some(prefix.to_string_lossy().into_owned())
    }
}

/// Walk `base` collecting (prefix, name) pairs for every directory
/// recognized as an entry by `is_entry`; non-entry directories are treated
/// as prefix shards and descended into
fn scan(
    base: &Path,
    is_entry: impl Fn(&Path, &str) -> bool,
) -> Result<Vec<(Option<String>, String)>> {
    let mut found = Vec::new();
    let mut stack = vec![base.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for (name, path) in filesystem::subdirs(&dir)? {
            if is_entry(&path, &name) {
                let prefix = path
                    .parent()
                    .and_then(|p| p.strip_prefix(base).ok())
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned());
                found.push((prefix, name));
            } else {
                stack.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn repo(root: &Path) -> Repository {
        Repository::local(root)
    }

    #[test]
    fn test_package_state_only_existing_files() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        // Only a manifest and a files directory exist
        let pkg_dir = layout::package_dir(&repo, None, "foo.1.0");
        fs::create_dir_all(pkg_dir.join(layout::FILES_DIR)).unwrap();
        fs::write(pkg_dir.join(layout::MANIFEST_FILE), b"{}").unwrap();
        fs::write(pkg_dir.join(layout::FILES_DIR).join("patch.diff"), b"--- a").unwrap();

        let state = package_state(&repo, None, "foo.1.0", StateScope::All).unwrap();
        assert_eq!(state.len(), 2);
        assert!(state.contains_path(&pkg_dir.join(layout::MANIFEST_FILE)));
        assert!(state.contains_path(&pkg_dir.join(layout::FILES_DIR).join("patch.diff")));
    }

    #[test]
    fn test_deleting_a_file_removes_exactly_its_entry() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let pkg_dir = layout::package_dir(&repo, None, "foo.1.0");
        fs::create_dir_all(pkg_dir.join(layout::FILES_DIR)).unwrap();
        fs::write(pkg_dir.join(layout::MANIFEST_FILE), b"{}").unwrap();
        fs::write(pkg_dir.join(layout::FILES_DIR).join("patch.diff"), b"--- a").unwrap();

        let before = package_state(&repo, None, "foo.1.0", StateScope::All).unwrap();
        fs::remove_file(pkg_dir.join(layout::FILES_DIR).join("patch.diff")).unwrap();
        let after = package_state(&repo, None, "foo.1.0", StateScope::All).unwrap();

        assert_ne!(before, after);
        assert_eq!(after.len(), before.len() - 1);
        assert!(!after.contains_path(&pkg_dir.join(layout::FILES_DIR).join("patch.diff")));
        assert!(after.contains_path(&pkg_dir.join(layout::MANIFEST_FILE)));
    }

    #[test]
    fn test_state_is_deterministic() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let pkg_dir = layout::package_dir(&repo, Some("f"), "foo.1.0");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join(layout::MANIFEST_FILE), b"{}").unwrap();
        fs::write(pkg_dir.join(layout::SOURCE_FILE), b"{\"url\": \"u\"}").unwrap();

        let a = package_state(&repo, Some("f"), "foo.1.0", StateScope::All).unwrap();
        let b = package_state(&repo, Some("f"), "foo.1.0", StateScope::All).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_partial_scope_excludes_metadata() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let pkg_dir = layout::package_dir(&repo, None, "foo.1.0");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join(layout::MANIFEST_FILE), b"{}").unwrap();
        fs::write(pkg_dir.join(layout::SOURCE_FILE), b"{\"url\": \"u\"}").unwrap();
        fs::create_dir_all(layout::archives_dir(&repo)).unwrap();
        fs::write(layout::package_archive(&repo, "foo.1.0"), b"tar").unwrap();

        let partial =
            package_state(&repo, None, "foo.1.0", StateScope::Partial { archive: false }).unwrap();
        assert_eq!(partial.len(), 1);
        assert!(partial.contains_path(&pkg_dir.join(layout::SOURCE_FILE)));

        let with_archive =
            package_state(&repo, None, "foo.1.0", StateScope::Partial { archive: true }).unwrap();
        assert_eq!(with_archive.len(), 2);
        assert!(with_archive.contains_path(&layout::package_archive(&repo, "foo.1.0")));
    }

    #[test]
    fn test_missing_package_state_is_empty() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());
        let state = package_state(&repo, None, "ghost.0.1", StateScope::All).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_compiler_state() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let comp_dir = layout::compiler_dir(&repo, None, "5.1.0");
        fs::create_dir_all(&comp_dir).unwrap();
        fs::write(comp_dir.join("5.1.0.json"), b"{}").unwrap();

        let state = compiler_state(&repo, None, "5.1.0").unwrap();
        assert_eq!(state.len(), 1);
        assert!(state.contains_path(&comp_dir.join("5.1.0.json")));
    }

    #[test]
    fn test_enumeration_recovers_prefixes() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        for (prefix, name) in [(None, "bare.1.0"), (Some("s"), "sharded.2.0")] {
            let pkg_dir = layout::package_dir(&repo, prefix, name);
            fs::create_dir_all(&pkg_dir).unwrap();
            fs::write(pkg_dir.join(layout::MANIFEST_FILE), b"{}").unwrap();
        }

        let found = packages(&repo).unwrap();
        assert_eq!(
            found,
            vec![
                (None, "bare.1.0".to_string()),
                (Some("s".to_string()), "sharded.2.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_compiler_enumeration_requires_definition_file() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let real = layout::compiler_dir(&repo, None, "5.1.0");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("5.1.0.json"), b"{}").unwrap();

        // A directory without its definition file is not a compiler entry
        fs::create_dir_all(layout::compiler_dir(&repo, None, "junk")).unwrap();

        let found = compilers(&repo).unwrap();
        assert_eq!(found, vec![(None, "5.1.0".to_string())]);
    }

    #[test]
    fn test_extract_prefix() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path());

        let bare = layout::package_dir(&repo, None, "foo.1.0");
        assert_eq!(extract_prefix(&repo, &bare, "foo.1.0"), None);

        let sharded = layout::package_dir(&repo, Some("f"), "foo.1.0");
        assert_eq!(
            extract_prefix(&repo, &sharded, "foo.1.0"),
            Some("f".to_string())
        );

        // Path that is not the package's own directory
        assert_eq!(extract_prefix(&repo, &sharded, "bar.2.0"), None);
    }
}
