//! # minibox-image
//!
//! Image management for the minibox runtime.
//!
//! Handles:
//! - **Catalog**: the image table (name → rootfs path) and the in-use check
//!   against the container table.
//! - **Storage**: the owned rootfs copies under `<home>/images/<name>/rootfs`.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod catalog;
pub mod storage;
