//! `setrlimit`-based resource caps.
//!
//! Limits are applied inside the forked child, before `exec`, with the soft
//! and hard values equal. They need no privileges and no cgroup hierarchy.

use std::fmt;

use minibox_common::types::ResourceLimits;
use nix::errno::Errno;
use nix::sys::resource::{Resource, setrlimit};
use thiserror::Error;

/// A limit that could not be applied. The process still launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("could not apply {resource} = {requested}: {source}")]
pub struct LimitWarning {
    /// Kind of limit.
    pub resource: LimitKind,
    /// Requested value (seconds or bytes).
    pub requested: u64,
    /// Error returned by `setrlimit`.
    pub source: Errno,
}

/// Resource a [`LimitWarning`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// `RLIMIT_CPU`, in seconds.
    CpuTime,
    /// `RLIMIT_AS`, in bytes.
    AddressSpace,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuTime => f.write_str("RLIMIT_CPU"),
            Self::AddressSpace => f.write_str("RLIMIT_AS"),
        }
    }
}

/// Applies `limits` to the calling process.
///
/// Every requested limit is attempted; failures are collected rather than
/// aborting, so a partially constrained process is still possible.
pub fn apply(limits: &ResourceLimits) -> Vec<LimitWarning> {
    let mut warnings = Vec::new();
    if let Some(seconds) = limits.cpu_seconds {
        if let Err(source) = set_limit(Resource::RLIMIT_CPU, seconds) {
            warnings.push(LimitWarning {
                resource: LimitKind::CpuTime,
                requested: seconds,
                source,
            });
        }
    }
    if let Some(bytes) = limits.memory_bytes {
        if let Err(source) = set_limit(Resource::RLIMIT_AS, bytes) {
            warnings.push(LimitWarning {
                resource: LimitKind::AddressSpace,
                requested: bytes,
                source,
            });
        }
    }
    warnings
}

fn set_limit(resource: Resource, value: u64) -> Result<(), Errno> {
    setrlimit(resource, value, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_limits_apply_cleanly() {
        assert!(apply(&ResourceLimits::default()).is_empty());
    }

    #[test]
    fn warning_message_names_resource() {
        let warning = LimitWarning {
            resource: LimitKind::AddressSpace,
            requested: 16 * 1024 * 1024,
            source: Errno::EPERM,
        };
        let msg = warning.to_string();
        assert!(msg.contains("RLIMIT_AS"));
        assert!(msg.contains("16777216"));
    }
}
