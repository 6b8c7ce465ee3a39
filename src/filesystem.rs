// src/filesystem.rs

//! Filesystem and digest primitives shared by the backends and the state
//! tracker: SHA-256 digests, recursive listing, atomic writes, tree copies.

use crate::error::{Error, Result};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

/// Compute the hex SHA-256 digest of a file's contents
pub fn sha256_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest many files concurrently, pairing each path with its digest
///
/// Paths are returned in the input order; digesting itself is parallelized.
pub fn digest_files(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    paths
        .par_iter()
        .map(|p| sha256_digest(p).map(|digest| (p.clone(), digest)))
        .collect()
}

/// List every regular file under `dir`, recursively, in sorted order
///
/// A nonexistent directory yields an empty list rather than an error.
pub fn files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

/// List the immediate subdirectories of `dir` by name, sorted
pub fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            dirs.push((name, entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Create a directory and all of its parents
pub fn mkdir_p(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Remove a file or directory tree if it exists
pub fn rm_rf(path: &Path) -> Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Write a file atomically: write to a temp file in the same directory, then
/// rename over the destination
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Copy a directory tree, creating destination directories as needed
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
        // Symlinks and special files are not part of repository trees
    }
    Ok(())
}

/// Replace `dst` with a copy of `src`, removing anything already there
pub fn replace_tree(src: &Path, dst: &Path) -> Result<()> {
    rm_rf(dst)?;
    copy_tree(src, dst)
}
