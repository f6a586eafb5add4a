//! Home directory layout.
//!
//! Every component receives a [`HomeLayout`] explicitly instead of looking
//! the home directory up on its own.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::constants::{AUDIT_LOG, CONTAINERS_TABLE, HOME_DIR_NAME, IMAGES_TABLE};
use crate::error::{MiniboxError, Result};

/// Resolved on-disk layout of a minibox home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeLayout {
    base_dir: PathBuf,
}

impl HomeLayout {
    /// Creates a layout rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolves the layout from an explicit override or `$HOME/.minibox`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if no override is given and `HOME` is
    /// unset or empty.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(base) = explicit {
            return Ok(Self::new(base));
        }
        resolve_home_directory().map(|home| Self::new(home.join(HOME_DIR_NAME)))
    }

    /// Base directory holding every other path.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the owned rootfs copies.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.base_dir.join("images")
    }

    /// Directory holding per-container output logs.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Path to the image table.
    #[must_use]
    pub fn images_table(&self) -> PathBuf {
        self.base_dir.join(IMAGES_TABLE)
    }

    /// Path to the container table.
    #[must_use]
    pub fn containers_table(&self) -> PathBuf {
        self.base_dir.join(CONTAINERS_TABLE)
    }

    /// Path to the audit log.
    #[must_use]
    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join(AUDIT_LOG)
    }

    /// Path to a container's captured output.
    #[must_use]
    pub fn container_log(&self, container_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{container_id}.log"))
    }

    /// Creates all directories and empty files of the layout. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or file cannot be created.
    pub fn bootstrap(&self) -> Result<()> {
        ensure_directory(&self.base_dir)?;
        ensure_directory(&self.images_dir())?;
        ensure_directory(&self.logs_dir())?;
        ensure_file(&self.images_table())?;
        ensure_file(&self.containers_table())?;
        ensure_file(&self.audit_log())?;
        Ok(())
    }
}

/// Returns the user's home directory from `HOME`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `HOME` is unset or empty.
pub fn resolve_home_directory() -> Result<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(MiniboxError::InvalidArgument {
            message: "HOME is not set".into(),
        }),
    }
}

/// Creates `path` as a directory if it does not exist yet.
///
/// # Errors
///
/// Returns an error if creation fails or `path` exists as a non-directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| MiniboxError::io(path, e))
}

/// Creates `path` as an empty file if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the file cannot be opened for appending.
pub fn ensure_file(path: &Path) -> Result<()> {
    let _file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MiniboxError::io(path, e))?;
    Ok(())
}
