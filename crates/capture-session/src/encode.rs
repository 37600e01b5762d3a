//! ffmpeg invocation for the concat manifest
//!
//! The output frame rate is derived from the nominal capture rate, not from
//! the measured timestamps: per-frame durations in the manifest carry the real
//! timing, the rate only sets how finely ffmpeg samples them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

/// Highest frame rate the output video is encoded at
pub const MAX_OUTPUT_FPS: u32 = 25;

/// Output frame rate: nominal input fps divided by the slowdown, rounded half
/// to even and capped at [`MAX_OUTPUT_FPS`]. Never below 1.
pub fn output_fps(input_fps: f64, slowdown: f64) -> u32 {
    let rate = (input_fps / slowdown).round_ties_even();
    if !rate.is_finite() || rate < 1.0 {
        return 1;
    }
    (rate as u32).min(MAX_OUTPUT_FPS)
}

/// One ffmpeg run turning a concat manifest into a video
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub program: PathBuf,
    pub manifest: PathBuf,
    pub output: PathBuf,
    pub fps: u32,
}

impl EncodeJob {
    pub fn new(manifest: &Path, output: &Path, fps: u32) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            manifest: manifest.to_path_buf(),
            output: output.to_path_buf(),
            fps,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments passed to ffmpeg, in order
    pub fn args(&self) -> Vec<OsString> {
        let fps = self.fps.to_string();
        let mut args: Vec<OsString> = [
            "-loglevel",
            "warning",
            "-r",
            fps.as_str(),
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .iter()
        .map(OsString::from)
        .collect();

        args.push(self.manifest.clone().into_os_string());
        args.extend(
            [
                "-vcodec",
                "libx264",
                "-x264-params",
                "log-level=-1:lossless=1",
                "-b:v",
                "1M",
                "-pix_fmt",
                "yuv420p",
                // libx264 with yuv420p needs even dimensions
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            ]
            .iter()
            .map(OsString::from),
        );
        args.push(self.output.clone().into_os_string());
        args.push(OsString::from("-y"));
        args
    }

    /// Run ffmpeg to completion. A non-zero exit is an error.
    pub fn run(&self) -> SessionResult<()> {
        info!(
            "Encoding {} at {} fps -> {}",
            self.manifest.display(),
            self.fps,
            self.output.display()
        );
        debug!("{} {:?}", self.program.display(), self.args());

        let output = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SessionError::encoder(None, format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::encoder(Some(output.status), stderr.trim()));
        }

        Ok(())
    }
}
