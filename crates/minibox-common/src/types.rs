//! Domain primitive types used across the minibox workspace.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::CONTAINER_ID_PREFIX;
use crate::error::MiniboxError;

/// Identifier of a container: `c<N>` with `N` allocated sequentially.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the ID carrying sequence number `n`.
    #[must_use]
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("{CONTAINER_ID_PREFIX}{n}"))
    }

    /// Numeric suffix of a well-formed `c<N>` ID.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        let digits = self.0.strip_prefix(CONTAINER_ID_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Persisted lifecycle status of a container.
///
/// `Running` is the only non-terminal status; a record leaves it exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The entry process was launched and has not been observed to end.
    Running,
    /// The entry process ended on its own.
    Exited,
    /// The entry process ended within the grace period after `stop`.
    Stopped,
    /// The entry process had to be force-killed by `stop`.
    Killed,
}

impl ContainerStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Stopped => "stopped",
            Self::Killed => "killed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ContainerStatus {
    type Err = MiniboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "exited" => Ok(Self::Exited),
            "stopped" => Ok(Self::Stopped),
            "killed" => Ok(Self::Killed),
            other => Err(MiniboxError::InvalidArgument {
                message: format!("unknown container status: {other}"),
            }),
        }
    }
}

/// OS resource limits applied to a container's entry process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU time limit in seconds (`RLIMIT_CPU`).
    pub cpu_seconds: Option<u64>,
    /// Address-space limit in bytes (`RLIMIT_AS`).
    pub memory_bytes: Option<u64>,
}

/// One row of the container table.
///
/// Field order on disk: `id|pid|image|status|start_time|end_time|exit_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    /// Unique, immutable identifier.
    pub id: ContainerId,
    /// PID of the entry process, fixed at creation.
    pub pid: i32,
    /// Name of the image the container was launched from.
    pub image: String,
    /// Stored lifecycle status.
    pub status: ContainerStatus,
    /// Launch timestamp.
    pub start_time: String,
    /// Timestamp at which the status left `running`.
    pub end_time: Option<String>,
    /// Exit code, absent until the supervisor reaps the process.
    pub exit_code: Option<i32>,
}

impl ContainerRecord {
    /// A freshly launched record in the `running` status.
    #[must_use]
    pub fn running(id: ContainerId, pid: i32, image: impl Into<String>, start_time: String) -> Self {
        Self {
            id,
            pid,
            image: image.into(),
            status: ContainerStatus::Running,
            start_time,
            end_time: None,
            exit_code: None,
        }
    }
}

/// One row of the image table.
///
/// Field order on disk: `name|rootfs_path|created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Unique image name.
    pub name: String,
    /// Owned, immutable copy of the source tree.
    pub rootfs_path: PathBuf,
    /// Build timestamp.
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_of_well_formed_ids() {
        assert_eq!(ContainerId::new("c1").sequence(), Some(1));
        assert_eq!(ContainerId::new("c42").sequence(), Some(42));
        assert_eq!(ContainerId::from_sequence(7).as_str(), "c7");
    }

    #[test]
    fn sequence_of_foreign_ids_is_none() {
        assert_eq!(ContainerId::new("c").sequence(), None);
        assert_eq!(ContainerId::new("x5").sequence(), None);
        assert_eq!(ContainerId::new("c5a").sequence(), None);
    }

    #[test]
    fn status_parses_its_own_display() {
        for status in [
            ContainerStatus::Running,
            ContainerStatus::Exited,
            ContainerStatus::Stopped,
            ContainerStatus::Killed,
        ] {
            assert_eq!(status.to_string().parse::<ContainerStatus>().ok(), Some(status));
        }
        assert!("paused".parse::<ContainerStatus>().is_err());
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!ContainerStatus::Running.is_terminal());
        assert!(ContainerStatus::Exited.is_terminal());
        assert!(ContainerStatus::Killed.is_terminal());
    }

    #[test]
    fn new_running_record_has_no_exit_data() {
        let rec = ContainerRecord::running(
            ContainerId::new("c1"),
            4242,
            "alpine",
            "2026-01-01T00:00:00".into(),
        );
        assert_eq!(rec.status, ContainerStatus::Running);
        assert!(rec.end_time.is_none());
        assert!(rec.exit_code.is_none());
    }
}
