//! slowmo: turn a high-speed capture session into a slow-motion video
//!
//! The heavy lifting lives in two workspace crates: `frame-timing` rebuilds
//! per-frame durations from the capture log, `capture-session` handles the
//! drive, staging, raw conversion, encoding and cleanup. This crate wires them
//! into a single run.

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{RunSettings, SessionConfig};
pub use pipeline::{absolute_path, Pipeline, SessionSummary};
pub use report::{format_stats, print_stats, StatsDocument};
