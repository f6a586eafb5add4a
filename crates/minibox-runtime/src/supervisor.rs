//! Process supervisor: launches a container and blocks until it exits.
//!
//! A launch goes `launching → running → exited`. Only `running` and the
//! final state are persisted; a record exists once the fork succeeded.

use minibox_common::config::HomeLayout;
use minibox_common::constants::{BASE_ENV, DEFAULT_SHELL};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::time::current_timestamp;
use minibox_common::types::{ContainerId, ContainerRecord, ResourceLimits};
use minibox_core::process::{self, LaunchSpec, Termination};
use minibox_image::catalog::ImageCatalog;
use nix::sys::signal::Signal;

use crate::audit::AuditLog;
use crate::state::ContainerTable;

/// Parameters of `run`.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Image name to launch from.
    pub image: String,
    /// CPU and memory caps.
    pub limits: ResourceLimits,
    /// `KEY=VALUE` overrides, in command-line order.
    pub env: Vec<(String, String)>,
    /// Entry command and arguments; empty means the default shell.
    pub command: Vec<String>,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Allocated container id.
    pub id: ContainerId,
    /// PID of the entry process.
    pub pid: i32,
    /// How the process ended.
    pub termination: Termination,
    /// Shell-style exit code stored in the record.
    pub exit_code: i32,
    /// Annotation for signal deaths.
    pub reason: Option<String>,
    /// Whether the record was both registered and finalized.
    pub recorded: bool,
}

/// Launches containers and supervises them to completion.
#[derive(Debug, Clone)]
pub struct Supervisor {
    layout: HomeLayout,
    catalog: ImageCatalog,
    containers: ContainerTable,
    audit: AuditLog,
}

impl Supervisor {
    /// Creates a supervisor over `layout`.
    #[must_use]
    pub fn new(layout: &HomeLayout) -> Self {
        Self {
            layout: layout.clone(),
            catalog: ImageCatalog::open(layout),
            containers: ContainerTable::open(layout),
            audit: AuditLog::open(layout),
        }
    }

    /// Runs a container and blocks until its entry process terminates.
    ///
    /// `on_started` is invoked with the id and pid right after launch,
    /// before blocking. A failure to persist the `running` record is only
    /// a warning: the child is still waited for.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown image, `RootfsMissing` for a stale
    /// catalog entry, `Process` if fork or wait fails, and I/O errors from
    /// id allocation.
    pub fn run(
        &self,
        request: &RunRequest,
        on_started: impl FnOnce(&ContainerId, i32),
    ) -> Result<RunOutcome> {
        let rootfs = self.catalog.resolve(&request.image)?;
        if !rootfs.is_dir() {
            return Err(MiniboxError::RootfsMissing {
                image: request.image.clone(),
                path: rootfs,
            });
        }

        let id = self.containers.next_id()?;
        let argv = if request.command.is_empty() {
            vec![DEFAULT_SHELL.to_string()]
        } else {
            request.command.clone()
        };
        let spec = LaunchSpec {
            argv,
            env: build_environment(&request.env),
            workdir: rootfs,
            log_dir: self.layout.logs_dir(),
            log_file: self.layout.container_log(id.as_str()),
            limits: request.limits,
        };

        let handle = process::spawn(&spec)?;
        let pid = handle.pid();
        tracing::info!(id = %id, pid, image = %request.image, "container started");

        let record = ContainerRecord::running(id.clone(), pid, &request.image, current_timestamp());
        let mut recorded = match self.containers.insert(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %id, pid, error = %e, "could not register container; still waiting for it");
                false
            }
        };
        self.audit.record(format_args!(
            "RUN container_id={id} pid={pid} image={}",
            request.image
        ));
        on_started(&id, pid);

        let termination = handle.wait()?;
        let exit_code = termination.exit_code();
        let reason = exit_reason(termination);

        if recorded {
            if let Err(e) = self
                .containers
                .finalize_exit(id.as_str(), exit_code, &current_timestamp())
            {
                tracing::warn!(id = %id, error = %e, "could not record container exit");
                recorded = false;
            }
        }
        self.audit.record(format_args!(
            "EXIT container_id={id} pid={pid} exit_code={exit_code}"
        ));
        tracing::info!(id = %id, pid, exit_code, reason = reason.as_deref(), "container exited");

        Ok(RunOutcome {
            id,
            pid,
            termination,
            exit_code,
            reason,
            recorded,
        })
    }
}

/// Baseline `PATH`/`HOME`/`TERM` plus user overrides.
///
/// Overrides are not de-duplicated among themselves. They come first,
/// last-listed first, so a first-match lookup such as `getenv` sees the
/// last-listed value. A baseline entry is left out once any override names
/// its key, so a single override wins for every kind of consumer.
#[must_use]
pub fn build_environment(overrides: &[(String, String)]) -> Vec<(String, String)> {
    let baseline = BASE_ENV
        .iter()
        .filter(|(key, _)| !overrides.iter().any(|(k, _)| k == key))
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()));
    overrides.iter().rev().cloned().chain(baseline).collect()
}

/// Annotation explaining a signal death.
///
/// A bare `SIGKILL` is only suggestive of the address-space limit: the
/// kernel gives no way to tell it apart from an external kill.
#[must_use]
pub fn exit_reason(termination: Termination) -> Option<String> {
    match termination {
        Termination::Exited(_) => None,
        Termination::Signaled(Signal::SIGXCPU) => Some("CPU time limit exceeded".into()),
        Termination::Signaled(Signal::SIGKILL) => {
            Some("killed (possibly memory limit exceeded)".into())
        }
        Termination::Signaled(signal) => Some(format!("terminated by signal {}", signal.as_str())),
    }
}
