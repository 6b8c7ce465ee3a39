// src/error.rs

use thiserror::Error;

/// Core error types for Quarry
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed config or index document
    #[error("Invalid JSON document: {0}")]
    Config(#[from] serde_json::Error),

    /// Transport-level download failure
    #[error("Download failed: {0}")]
    Download(String),

    /// No backend registered for the requested kind
    #[error("No backend registered for kind '{0}'")]
    UnknownBackend(String),

    /// Fresh artifact digest disagrees with the expected checksum
    #[error(
        "Checksum mismatch for {artifact}:\n  expected {expected}\n  actual   {actual}\n\
         Update the repository to refresh its metadata, or disable checksum \
         verification to force the download."
    )]
    ChecksumMismatch {
        artifact: String,
        expected: String,
        actual: String,
    },

    /// Mirrored repository declares a format newer than this build supports
    #[error(
        "Repository '{repository}' uses format version {declared} but this build \
         supports at most {supported}. Upgrade quarry to use this repository."
    )]
    IncompatibleVersion {
        repository: String,
        declared: semver::Version,
        supported: semver::Version,
    },

    /// The precedence graph contains a cycle
    #[error("Cyclic precedence between repositories: {0}")]
    CyclicPrecedence(String),

    /// A multi-repository update finished with failures
    #[error(
        "Update failed for: {}; skipped (dependent on a failed repository): {}",
        .failed.join(", "),
        .skipped.join(", ")
    )]
    SyncFailed {
        failed: Vec<String>,
        skipped: Vec<String>,
    },
}

impl Error {
    /// Whether the top-level caller should treat this error as unrecoverable.
    ///
    /// Continuing past any of these would silently use untrusted or
    /// unreadable data, so the binary prints the message and exits. The
    /// library itself never terminates the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnknownBackend(_)
                | Error::ChecksumMismatch { .. }
                | Error::IncompatibleVersion { .. }
        )
    }
}

/// Result type alias using Quarry's Error type
pub type Result<T> = std::result::Result<T, Error>;
