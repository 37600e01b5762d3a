//! Frame timing reconstruction for slowmo
//!
//! This crate turns the capture device's timestamp log into an ordered list of
//! per-frame display durations, summary statistics for the operator, and the
//! concat manifest consumed by ffmpeg's frame-concatenation demuxer.

pub mod durations;
pub mod error;
pub mod manifest;
pub mod timestamps;

pub use durations::{build_duration_records, DurationModel, DurationRecord, SessionStats};
pub use error::{TimingError, TimingResult};
pub use manifest::{format_concat_manifest, frame_file_name, write_concat_manifest, FinalEntry};
pub use timestamps::{parse_timestamp_log, read_timestamp_log, TimestampRecord};

/// Extension of the intermediate images referenced by the manifest
pub const FRAME_EXTENSION: &str = "tiff";

/// Microseconds per second of capture clock
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;
