//! # minibox-store
//!
//! Persistent record tables for the minibox runtime.
//!
//! A table is a flat text file holding one record per line, fields joined
//! by `|`. Appends go straight to the end of the file; every update or
//! delete rewrites the whole table into a sibling temporary file and
//! renames it over the original, so a crash mid-write leaves the previous
//! table intact.
//!
//! Tables are re-read on every call and never cached. There is no
//! cross-process locking: two writers racing on the same table can lose
//! one update (last rename wins).

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod records;
pub mod table;

pub use table::{Record, Table};
