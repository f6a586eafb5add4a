//! Append-only audit log of lifecycle events.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use minibox_common::config::HomeLayout;
use minibox_common::time::current_timestamp;

/// Best-effort event log (`log.txt` in the home layout).
///
/// Each event is one line: `[<timestamp>] <EVENT> key=value ...`. Write
/// failures are reported through `tracing` and otherwise ignored.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Binds the audit log of `layout`.
    #[must_use]
    pub fn open(layout: &HomeLayout) -> Self {
        Self {
            path: layout.audit_log(),
        }
    }

    /// Appends one event line.
    pub fn record(&self, event: fmt::Arguments<'_>) {
        let line = format!("[{}] {event}\n", current_timestamp());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "audit log write failed");
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
