// src/layout.rs

//! Canonical on-disk layout of a mirrored repository
//!
//! Every local path the rest of the crate touches is constructed here:
//!
//! ```text
//! <root>/
//!   repo.json              repository descriptor
//!   version                declared repository format version
//!   last-update            RFC 3339 stamp of the last successful update
//!   packages/[prefix/]<pkg>/{manifest.json,description,source.json,files/}
//!   archives/<pkg>.tar.gz
//!   compilers/[prefix/]<comp>/{description,<comp>.json}
//! ```

use crate::repository::Repository;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "repo.json";
pub const VERSION_FILE: &str = "version";
pub const STAMP_FILE: &str = "last-update";

pub const PACKAGES_DIR: &str = "packages";
pub const ARCHIVES_DIR: &str = "archives";
pub const COMPILERS_DIR: &str = "compilers";

pub const MANIFEST_FILE: &str = "manifest.json";
pub const DESCRIPTION_FILE: &str = "description";
pub const SOURCE_FILE: &str = "source.json";
pub const FILES_DIR: &str = "files";

/// The repository's own config descriptor
pub fn repo_config(repo: &Repository) -> PathBuf {
    repo.root.join(CONFIG_FILE)
}

/// Marker file holding the repository's declared format version
pub fn version_file(repo: &Repository) -> PathBuf {
    repo.root.join(VERSION_FILE)
}

/// Stamp file recording the last successful update
pub fn update_stamp(repo: &Repository) -> PathBuf {
    repo.root.join(STAMP_FILE)
}

/// Root of the packages subtree
pub fn packages_dir(repo: &Repository) -> PathBuf {
    repo.root.join(PACKAGES_DIR)
}

/// Root of the prebuilt archives subtree
pub fn archives_dir(repo: &Repository) -> PathBuf {
    repo.root.join(ARCHIVES_DIR)
}

/// Root of the compilers subtree
pub fn compilers_dir(repo: &Repository) -> PathBuf {
    repo.root.join(COMPILERS_DIR)
}

/// Directory holding one package's files, under its optional shard prefix
pub fn package_dir(repo: &Repository, prefix: Option<&str>, package: &str) -> PathBuf {
    match prefix {
        Some(prefix) => packages_dir(repo).join(prefix).join(package),
        None => packages_dir(repo).join(package),
    }
}

/// A package's metadata manifest
pub fn package_manifest(repo: &Repository, prefix: Option<&str>, package: &str) -> PathBuf {
    package_dir(repo, prefix, package).join(MANIFEST_FILE)
}

/// A package's human-readable description
pub fn package_description(repo: &Repository, prefix: Option<&str>, package: &str) -> PathBuf {
    package_dir(repo, prefix, package).join(DESCRIPTION_FILE)
}

/// A package's upstream source descriptor (URL, kind, checksum)
pub fn package_source(repo: &Repository, prefix: Option<&str>, package: &str) -> PathBuf {
    package_dir(repo, prefix, package).join(SOURCE_FILE)
}

/// A package's auxiliary files directory (patches, overlays)
pub fn package_files_dir(repo: &Repository, prefix: Option<&str>, package: &str) -> PathBuf {
    package_dir(repo, prefix, package).join(FILES_DIR)
}

/// A package's prebuilt source archive; archives are never sharded
pub fn package_archive(repo: &Repository, package: &str) -> PathBuf {
    archives_dir(repo).join(format!("{}.tar.gz", package))
}

/// Directory holding one compiler's files, under its optional shard prefix
pub fn compiler_dir(repo: &Repository, prefix: Option<&str>, compiler: &str) -> PathBuf {
    match prefix {
        Some(prefix) => compilers_dir(repo).join(prefix).join(compiler),
        None => compilers_dir(repo).join(compiler),
    }
}

/// A compiler's human-readable description
pub fn compiler_description(repo: &Repository, prefix: Option<&str>, compiler: &str) -> PathBuf {
    compiler_dir(repo, prefix, compiler).join(DESCRIPTION_FILE)
}

/// A compiler's definition file, named after the compiler itself
pub fn compiler_def(repo: &Repository, prefix: Option<&str>, compiler: &str) -> PathBuf {
    compiler_dir(repo, prefix, compiler).join(format!("{}.json", compiler))
}
