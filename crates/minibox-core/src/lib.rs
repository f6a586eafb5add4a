//! # minibox-core
//!
//! Low-level process primitives for the minibox runtime.
//!
//! This crate provides safe wrappers over:
//! - **Process control**: fork/exec of a container entry process with its
//!   output redirected to a log file, blocking reaping, liveness probing,
//!   and signal delivery ([`process::ProcessHandle`]).
//! - **Resource limits**: `setrlimit`-based CPU-time and address-space caps
//!   ([`limits`]).
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod limits;
pub mod process;
