//! Run configuration
//!
//! Everything is supplied on the command line at process start; nothing is
//! read from or written to a configuration file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use capture_session::SourceLocator;
use frame_timing::FinalEntry;
use serde::{Deserialize, Serialize};

/// The three parameters that define a session's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How many times slower than real time the video plays
    pub slowdown: f64,
    /// Output video file name
    pub output_name: String,
    /// Nominal capture frame rate, used only to pick the encoding rate
    pub input_fps: f64,
}

impl SessionConfig {
    pub fn new(slowdown: f64, output_name: impl Into<String>, input_fps: f64) -> Result<Self> {
        let config = Self {
            slowdown,
            output_name: output_name.into(),
            input_fps,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.slowdown.is_finite() && self.slowdown > 0.0) {
            bail!("Slowdown factor must be a positive number, got {}", self.slowdown);
        }
        if !(self.input_fps.is_finite() && self.input_fps > 0.0) {
            bail!("Input fps must be a positive number, got {}", self.input_fps);
        }
        if self.output_name.trim().is_empty() {
            bail!("Output name must not be empty");
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slowdown: 30.0,
            output_name: "test_01.mp4".to_string(),
            input_fps: 440.0,
        }
    }
}

/// Where to look, where to work and which external programs to run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Candidate capture roots in priority order
    pub sources: Vec<PathBuf>,
    pub work_dir: PathBuf,
    pub poll_interval: Duration,
    pub ready_timeout: Option<Duration>,
    pub ffmpeg: PathBuf,
    pub dcraw: PathBuf,
    pub final_entry: FinalEntry,
    /// Open the finished video with the system viewer
    pub open_output: bool,
    /// Delete the capture files from the source after a successful run
    pub drain_source: bool,
}

impl RunSettings {
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources: SourceLocator::default_drives().candidates().to_vec(),
            work_dir: work_dir.into(),
            poll_interval: Duration::from_secs(1),
            ready_timeout: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            dcraw: PathBuf::from("dcraw"),
            final_entry: FinalEntry::AsIs,
            open_output: false,
            drain_source: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_slowdown() {
        assert!(SessionConfig::new(0.0, "out.mp4", 440.0).is_err());
        assert!(SessionConfig::new(-2.0, "out.mp4", 440.0).is_err());
        assert!(SessionConfig::new(f64::NAN, "out.mp4", 440.0).is_err());
    }

    #[test]
    fn test_rejects_bad_fps_and_name() {
        assert!(SessionConfig::new(30.0, "out.mp4", 0.0).is_err());
        assert!(SessionConfig::new(30.0, "  ", 440.0).is_err());
    }

    #[test]
    fn test_default_settings_prefer_wired_drive() {
        let settings = RunSettings::with_work_dir("temp");
        assert_eq!(settings.sources[0], PathBuf::from("W:\\"));
        assert_eq!(settings.sources.len(), 3);
        assert!(settings.ready_timeout.is_none());
        assert!(settings.drain_source);
    }
}
