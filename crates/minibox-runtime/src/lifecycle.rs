//! Lifecycle controller: liveness, status reconciliation, stop and removal.

use std::thread;

use minibox_common::config::HomeLayout;
use minibox_common::constants::{STOP_GRACE_PERIOD, STOP_KILL_WAIT};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::time::{current_timestamp, elapsed_duration};
use minibox_common::types::{ContainerId, ContainerRecord, ContainerStatus};
use minibox_core::process::ProcessHandle;
use nix::sys::signal::Signal;
use serde::Serialize;

use crate::audit::AuditLog;
use crate::state::ContainerTable;

/// Whether `pid` still refers to an existing process.
#[must_use]
pub fn liveness(pid: i32) -> bool {
    ProcessHandle::from_raw(pid).is_alive()
}

/// Effective status of a record. Never writes.
///
/// A `running` record whose process is gone reads as `exited`.
#[must_use]
pub fn reconcile(record: &ContainerRecord) -> ContainerStatus {
    if record.status == ContainerStatus::Running && !liveness(record.pid) {
        ContainerStatus::Exited
    } else {
        record.status
    }
}

/// One row of `ps`: a record with its reconciled status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerView {
    /// Container id.
    pub id: ContainerId,
    /// Entry process id.
    pub pid: i32,
    /// Image the container was launched from.
    pub image: String,
    /// Reconciled status.
    pub status: ContainerStatus,
    /// Launch time.
    pub start_time: String,
    /// Termination time, once finalized.
    pub end_time: Option<String>,
    /// Exit code, once finalized.
    pub exit_code: Option<i32>,
    /// `HH:MM:SS` since start, up to the end time if any.
    pub uptime: String,
}

impl ContainerView {
    /// Builds the view of `record`, probing its process.
    #[must_use]
    pub fn from_record(record: ContainerRecord) -> Self {
        let status = reconcile(&record);
        let uptime = match (&record.end_time, status) {
            (Some(end), _) => elapsed_duration(&record.start_time, Some(end)),
            (None, ContainerStatus::Running) => elapsed_duration(&record.start_time, None),
            (None, _) => UNKNOWN_UPTIME.to_string(),
        };
        Self {
            id: record.id,
            pid: record.pid,
            image: record.image,
            status,
            start_time: record.start_time,
            end_time: record.end_time,
            exit_code: record.exit_code,
            uptime,
        }
    }
}

// Dead but never finalized: the end time is unknown.
const UNKNOWN_UPTIME: &str = "--:--:--";

/// What `stop` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The record was already terminal; nothing was done.
    AlreadyStopped(ContainerStatus),
    /// Recorded as running but the process was gone; relabelled `exited`.
    Reconciled,
    /// Exited within the grace period after SIGTERM.
    Stopped,
    /// Needed SIGKILL.
    Killed,
}

/// Stop, remove and list containers against the persisted records.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    containers: ContainerTable,
    audit: AuditLog,
}

impl Lifecycle {
    /// Creates a controller over `layout`.
    #[must_use]
    pub fn new(layout: &HomeLayout) -> Self {
        Self {
            containers: ContainerTable::open(layout),
            audit: AuditLog::open(layout),
        }
    }

    /// All containers with their reconciled status.
    ///
    /// # Errors
    ///
    /// Returns an error if the container table cannot be read.
    pub fn list(&self) -> Result<Vec<ContainerView>> {
        Ok(self
            .containers
            .list()?
            .into_iter()
            .map(ContainerView::from_record)
            .collect())
    }

    /// Gracefully stops a container, escalating to SIGKILL after the grace
    /// period.
    ///
    /// Blocks for the full grace period whenever a signal is sent. Calling
    /// it on a terminal container is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `Process` if SIGTERM cannot be
    /// delivered, or an I/O error while rewriting the record.
    pub fn stop(&self, id: &str) -> Result<StopOutcome> {
        let record = self.containers.get(id)?;
        if record.status.is_terminal() {
            tracing::debug!(id, status = %record.status, "container already stopped");
            return Ok(StopOutcome::AlreadyStopped(record.status));
        }

        let pid = record.pid;
        let handle = ProcessHandle::from_raw(pid);
        if !handle.is_alive() {
            return self.mark_gone(id, pid);
        }
        if let Some(outcome) = self.send_term(id, handle)? {
            return Ok(outcome);
        }
        thread::sleep(STOP_GRACE_PERIOD);

        let outcome = if handle.is_alive() {
            if let Err(e) = handle.signal(Signal::SIGKILL) {
                // Lost the race with a late exit; it still counts as forced.
                tracing::warn!(id, pid, error = %e, "SIGKILL delivery failed");
            }
            self.audit.record(format_args!(
                "STOP container_id={id} pid={pid} signal=SIGKILL"
            ));
            tracing::info!(id, pid, "sent SIGKILL");
            thread::sleep(STOP_KILL_WAIT);
            StopOutcome::Killed
        } else {
            StopOutcome::Stopped
        };

        let status = match outcome {
            StopOutcome::Killed => ContainerStatus::Killed,
            _ => ContainerStatus::Stopped,
        };
        let _ = self
            .containers
            .mark_terminated(id, status, &current_timestamp())?;
        tracing::info!(id, pid, status = %status, "container stopped");
        Ok(outcome)
    }

    /// Sends SIGTERM. If delivery fails because the process exited in the
    /// meantime, the record is reconciled instead and that outcome returned.
    fn send_term(&self, id: &str, handle: ProcessHandle) -> Result<Option<StopOutcome>> {
        let pid = handle.pid();
        if let Err(e) = handle.signal(Signal::SIGTERM) {
            if handle.is_alive() {
                return Err(e);
            }
            tracing::debug!(id, pid, "process exited before SIGTERM");
            return self.mark_gone(id, pid).map(Some);
        }
        self.audit.record(format_args!(
            "STOP container_id={id} pid={pid} signal=SIGTERM"
        ));
        tracing::info!(id, pid, "sent SIGTERM");
        Ok(None)
    }

    /// Relabels a `running` record whose process no longer exists.
    fn mark_gone(&self, id: &str, pid: i32) -> Result<StopOutcome> {
        let _ = self
            .containers
            .mark_terminated(id, ContainerStatus::Exited, &current_timestamp())?;
        self.audit.record(format_args!(
            "STOP container_id={id} pid={pid} signal=none status=exited"
        ));
        tracing::info!(id, pid, "process already gone; marked exited");
        Ok(StopOutcome::Reconciled)
    }

    /// Deletes a container record. The log file is kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `StillRunning` if the record
    /// says running and the process is alive.
    pub fn remove(&self, id: &str) -> Result<ContainerRecord> {
        let record = self.containers.get(id)?;
        if record.status == ContainerStatus::Running && liveness(record.pid) {
            return Err(MiniboxError::StillRunning {
                id: id.to_string(),
                pid: record.pid,
            });
        }
        let removed = self.containers.remove(id)?;
        self.audit.record(format_args!(
            "RM container_id={id} pid={}",
            removed.pid
        ));
        tracing::info!(id, "container removed");
        Ok(removed)
    }
}
