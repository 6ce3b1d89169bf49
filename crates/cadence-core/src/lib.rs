//! cadence-core library.
//!
//! Activity-consistency core of the cadence tracker: merges server-recorded
//! and locally cached completions into one timeline, derives streaks and
//! per-item consistency from it, and reconciles local and remote state.
//!
//! # Conventions
//!
//! - **Errors**: library errors are `thiserror` enums carrying an
//!   [`error::ErrorCode`]; config loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Time**: operations that depend on "today" take `now` explicitly.

pub mod cache;
pub mod config;
pub mod consistency;
pub mod day;
pub mod error;
pub mod lock;
pub mod merge;
pub mod model;
pub mod reconcile;
pub mod remote;
pub mod streak;
