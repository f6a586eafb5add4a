//! # minibox-common
//!
//! Shared types, error definitions, the home directory layout, and
//! constants used across the entire minibox workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives that all other crates build
//! upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod time;
pub mod types;
