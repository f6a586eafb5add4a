//! Container lifecycle management for the minibox runtime.
//!
//! Every operation re-reads the record tables; nothing is cached between
//! calls, and there is no daemon. The only blocking points are the
//! supervisor waiting on its child and the log follower's poll loop.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod audit;
pub mod engine;
pub mod lifecycle;
pub mod logs;
pub mod state;
pub mod supervisor;
