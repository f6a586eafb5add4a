//! Container log retrieval and following.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use minibox_common::config::HomeLayout;
use minibox_common::constants::FOLLOW_POLL_INTERVAL;
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::ContainerStatus;

use crate::lifecycle::liveness;
use crate::state::ContainerTable;

/// Result of a log read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsOutcome {
    /// The container never produced a log file.
    NoLogs,
    /// The log was streamed; `bytes` is the total written out.
    Streamed {
        /// Bytes copied to the output.
        bytes: u64,
    },
}

/// Streams captured container output.
#[derive(Debug, Clone)]
pub struct LogFollower {
    layout: HomeLayout,
    containers: ContainerTable,
}

impl LogFollower {
    /// Creates a follower over `layout`.
    #[must_use]
    pub fn new(layout: &HomeLayout) -> Self {
        Self {
            layout: layout.clone(),
            containers: ContainerTable::open(layout),
        }
    }

    /// Log file path of a container.
    #[must_use]
    pub fn log_path(&self, container_id: &str) -> PathBuf {
        self.layout.container_log(container_id)
    }

    /// Copies the log of `id` to `out`.
    ///
    /// With `follow`, keeps polling for appended output while the container
    /// is recorded as running and its process is alive, then drains once
    /// more and returns.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or an I/O error reading the log
    /// or writing to `out`.
    pub fn stream(&self, id: &str, follow: bool, out: &mut impl Write) -> Result<LogsOutcome> {
        let record = self.containers.get(id)?;
        let path = self.log_path(id);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogsOutcome::NoLogs),
            Err(e) => return Err(MiniboxError::io(path, e)),
        };

        let mut bytes = drain(&mut file, out, &path)?;
        if follow && record.status == ContainerStatus::Running {
            tracing::debug!(id, pid = record.pid, "following log");
            while liveness(record.pid) {
                thread::sleep(FOLLOW_POLL_INTERVAL);
                bytes += drain(&mut file, out, &path)?;
            }
            bytes += drain(&mut file, out, &path)?;
        }
        Ok(LogsOutcome::Streamed { bytes })
    }
}

/// Copies everything from the current offset to end-of-file.
fn drain(file: &mut File, out: &mut impl Write, path: &Path) -> Result<u64> {
    let copied = io::copy(file, out).map_err(|e| MiniboxError::io(path, e))?;
    out.flush().map_err(|e| MiniboxError::io(path, e))?;
    Ok(copied)
}
