//! Unified error types for the minibox workspace.
//!
//! Library crates return [`MiniboxError`] values through the
//! [`Result`] alias; the CLI converts them into user-facing messages and a
//! non-zero exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MiniboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A required record was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A record with the same key already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Type of the conflicting resource.
        kind: &'static str,
        /// Identifier of the conflicting resource.
        id: String,
    },

    /// The image is registered but its rootfs copy is gone.
    #[error("rootfs for image {image} is missing or not a directory: {path}")]
    RootfsMissing {
        /// Image name.
        image: String,
        /// Stale rootfs path from the catalog.
        path: PathBuf,
    },

    /// The image is still referenced by a container record.
    #[error("image {image} is in use by one or more containers")]
    ImageInUse {
        /// Image name.
        image: String,
    },

    /// The container's process is still alive.
    #[error("container {id} is still running (pid {pid})")]
    StillRunning {
        /// Container identifier.
        id: String,
        /// Live process id.
        pid: i32,
    },

    /// A user-supplied value is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid value.
        message: String,
    },

    /// A process-control syscall (fork, wait, kill) failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the failed operation.
        message: String,
    },
}

impl MiniboxError {
    /// Builds an [`MiniboxError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for the not-found family of errors.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MiniboxError>;
