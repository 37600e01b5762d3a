//! Session orchestration
//!
//! One run processes one capture session, start to finish:
//! locate the source → wait for the capture → stage and convert →
//! build frame durations and the concat manifest → encode → clean up.
//!
//! Any failure up to and including encoding aborts the run and leaves the
//! working area in place for inspection. Cleanup failures after a successful
//! encode are reported but do not fail the run.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use capture_session::{
    await_ready, drain_source, output_fps, prepare_working_area, purge_working_area,
    stage_and_convert, DcrawDecoder, EncodeJob, FsProbe, RawDecoder, ReadyWait, SourceLocator,
    StageReport, MANIFEST_FILE, MARKER_FILE,
};
use frame_timing::{frame_file_name, read_timestamp_log, write_concat_manifest, DurationModel, SessionStats};
use tracing::{info, warn};

use crate::config::{RunSettings, SessionConfig};
use crate::report;

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub source: PathBuf,
    pub output: PathBuf,
    pub stats: SessionStats,
    pub stage: StageReport,
    pub encode_fps: u32,
    /// Cleanup problems, reported after the video was already written
    pub cleanup_warnings: Vec<String>,
}

pub struct Pipeline {
    config: SessionConfig,
    settings: RunSettings,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: SessionConfig, settings: RunSettings) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops the wait for capture data when set
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.settings.work_dir.join(MANIFEST_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.config.output_name)
    }

    /// Run with the dcraw decoder configured in the settings
    pub fn run(&self) -> Result<SessionSummary> {
        let decoder = DcrawDecoder::new(&self.settings.dcraw);
        self.run_with(&decoder)
    }

    pub fn run_with<D: RawDecoder>(&self, decoder: &D) -> Result<SessionSummary> {
        let source = SourceLocator::new(self.settings.sources.iter().cloned())
            .locate_with(&FsProbe)
            .context("Failed to find the capture drive")?;

        println!("🎞 Waiting for camera data...");
        let wait = ReadyWait::default()
            .with_interval(self.settings.poll_interval)
            .with_timeout(self.settings.ready_timeout)
            .with_cancel(self.cancel_token());
        await_ready(&source, &wait)?;

        println!("📁 Transferring files and writing durations...");
        // ffmpeg resolves relative manifest entries against the manifest's
        // own directory, so everything below works on the absolute path
        let work_dir = absolute_path(&self.settings.work_dir)?;
        prepare_working_area(&work_dir)
            .with_context(|| format!("Failed to prepare working area {}", work_dir.display()))?;
        let stage = stage_and_convert(&source, &work_dir, decoder)
            .with_context(|| format!("Failed to stage capture from {}", source.display()))?;
        println!("Transfer took {:.2} s", stage.elapsed_seconds());

        let manifest = work_dir.join(MANIFEST_FILE);
        let stats = self.write_durations(&work_dir, &manifest)?;
        report::print_stats(&stats);

        println!("📽 Creating video...");
        let output = self.output_path();
        let encode_fps = output_fps(self.config.input_fps, self.config.slowdown);
        EncodeJob::new(&manifest, &output, encode_fps)
            .with_program(&self.settings.ffmpeg)
            .run()
            .context("Video encoding failed")?;
        info!("Wrote {}", output.display());

        if self.settings.open_output {
            if let Err(e) = open_in_viewer(&output) {
                warn!("Could not open {}: {}", output.display(), e);
            }
        }

        println!("🗑️ Cleaning up...");
        let cleanup_warnings = self.tidy_up(&work_dir, &source, &output);
        for warning in &cleanup_warnings {
            println!("⚠️  {}", warning);
        }
        println!("Finished");

        Ok(SessionSummary {
            source,
            output,
            stats,
            stage,
            encode_fps,
            cleanup_warnings,
        })
    }

    /// Read the staged log, write the concat manifest and return the stats
    fn write_durations(&self, work_dir: &Path, manifest: &Path) -> Result<SessionStats> {
        let log_path = work_dir.join(MARKER_FILE);
        let log = read_timestamp_log(&log_path)
            .with_context(|| format!("Failed to read timestamp log {}", log_path.display()))?;

        let model = DurationModel::build(&log, self.config.slowdown)
            .with_context(|| format!("No frame durations in {}", log_path.display()))?;

        let missing = model
            .records
            .iter()
            .filter(|r| !work_dir.join(frame_file_name(r.frame_index)).exists())
            .count();
        if missing > 0 {
            warn!("{} frames in the timestamp log have no converted image", missing);
        }

        write_concat_manifest(manifest, &model.records, work_dir, self.settings.final_entry)
            .with_context(|| format!("Failed to write manifest {}", manifest.display()))?;

        Ok(model.stats)
    }

    fn tidy_up(&self, work_dir: &Path, source: &Path, output: &Path) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = purge_working_area(work_dir) {
            warnings.push(e.to_string());
        }

        if self.settings.drain_source {
            let keep = output_name_at(source, output);
            if let Err(e) = drain_source(source, keep.as_deref()) {
                warnings.push(e.to_string());
            }
        }

        warnings
    }
}

/// `path` itself if absolute, otherwise resolved against the current directory
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Unable to determine current directory")?;
    Ok(cwd.join(path))
}

/// File name of `output` if it is written directly into `dir`
fn output_name_at(dir: &Path, output: &Path) -> Option<OsString> {
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let same_dir = fs::canonicalize(parent).ok()? == fs::canonicalize(dir).ok()?;
    if same_dir {
        output.file_name().map(|n| n.to_os_string())
    } else {
        None
    }
}

fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut command = Command::new("xdg-open");

    command.arg(path).spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_session::{RawHandle, SessionError, SessionResult};
    use image::RgbImage;
    use std::time::Duration;
    use tempfile::tempdir;

    struct SolidDecoder;
    struct SolidHandle;

    impl RawDecoder for SolidDecoder {
        type Handle = SolidHandle;

        fn open(&self, _path: &Path) -> SessionResult<SolidHandle> {
            Ok(SolidHandle)
        }
    }

    impl RawHandle for SolidHandle {
        fn postprocess(&mut self) -> SessionResult<RgbImage> {
            Ok(RgbImage::new(3, 3))
        }
    }

    fn settings(source: &Path, work_dir: &Path) -> RunSettings {
        let mut settings = RunSettings::with_work_dir(work_dir);
        settings.sources = vec![source.join("missing"), source.to_path_buf()];
        settings.poll_interval = Duration::from_millis(5);
        settings.ready_timeout = Some(Duration::from_millis(50));
        settings
    }

    fn write_capture(source: &Path, log: &str) -> Result<()> {
        fs::write(source.join(MARKER_FILE), log)?;
        for idx in 0..3 {
            fs::write(source.join(format!("out.{:06}.raw.all", idx)), b"raw")?;
        }
        Ok(())
    }

    #[test]
    fn test_output_name_at_matches_only_same_directory() -> Result<()> {
        let dir = tempdir()?;
        let other = tempdir()?;
        let output = dir.path().join("test_01.mp4");

        assert_eq!(output_name_at(dir.path(), &output), Some(OsString::from("test_01.mp4")));
        assert_eq!(output_name_at(other.path(), &output), None);
        Ok(())
    }

    #[test]
    fn test_missing_source_fails_before_touching_work_dir() -> Result<()> {
        let root = tempdir()?;
        let work = root.path().join("temp");
        let mut settings = settings(root.path(), &work);
        settings.sources = vec![root.path().join("W"), root.path().join("Y")];

        let pipeline = Pipeline::new(SessionConfig::default(), settings)?;
        let err = pipeline.run_with(&SolidDecoder).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::NoSourceFound { .. })
        ));
        assert!(!work.exists());
        Ok(())
    }

    #[test]
    fn test_ready_timeout_is_surfaced() -> Result<()> {
        let source = tempdir()?;
        let work = tempdir()?;
        let pipeline = Pipeline::new(SessionConfig::default(), settings(source.path(), work.path()))?;

        let err = pipeline.run_with(&SolidDecoder).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::ReadyTimeout { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_baseline_only_log_stops_before_encoding() -> Result<()> {
        let source = tempdir()?;
        let work = tempdir()?;
        write_capture(source.path(), "0,-1,0\n")?;

        let mut settings = settings(source.path(), work.path());
        settings.ffmpeg = PathBuf::from("definitely-not-a-real-ffmpeg-binary");
        let pipeline = Pipeline::new(SessionConfig::default(), settings)?;

        let err = pipeline.run_with(&SolidDecoder).unwrap_err();
        assert!(err.chain().any(|e| e.to_string().contains("no frames after the baseline")));
        // Nothing is cleaned up on failure
        assert!(source.path().join(MARKER_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_encoder_failure_skips_cleanup() -> Result<()> {
        let source = tempdir()?;
        let work = tempdir()?;
        write_capture(source.path(), "0,-1,0\n0,0,1000\n1,1,3000\n2,2,4500\n")?;

        let mut settings = settings(source.path(), work.path());
        settings.ffmpeg = PathBuf::from("definitely-not-a-real-ffmpeg-binary");
        let pipeline = Pipeline::new(SessionConfig::default(), settings)?;

        let err = pipeline.run_with(&SolidDecoder).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::EncoderFailure { .. })
        ));
        assert!(pipeline.manifest_path().exists());
        assert!(work.path().join("out.000002.tiff").exists());
        assert!(source.path().join(MARKER_FILE).exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_full_session_with_stand_in_encoder() -> Result<()> {
        let source = tempdir()?;
        let root = tempdir()?;
        let work = root.path().join("temp");
        write_capture(source.path(), "0,-1,0\n0,0,1000\n1,1,3000\n2,2,4500\n")?;

        let mut settings = settings(source.path(), &work);
        settings.ffmpeg = PathBuf::from("true");
        let config = SessionConfig::new(30.0, root.path().join("out.mp4").to_string_lossy(), 440.0)?;
        let pipeline = Pipeline::new(config, settings)?;

        let summary = pipeline.run_with(&SolidDecoder)?;

        assert_eq!(summary.source, source.path());
        assert_eq!(summary.stats.frame_count, 3);
        assert_eq!(summary.stage.converted(), 3);
        assert_eq!(summary.encode_fps, 15);
        assert!(summary.cleanup_warnings.is_empty());
        assert!(!work.exists());
        assert_eq!(fs::read_dir(source.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_absolute_path_keeps_absolute_and_resolves_relative() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(absolute_path(dir.path())?, dir.path());

        let resolved = absolute_path(Path::new("temp"))?;
        assert!(resolved.is_absolute());
        assert_eq!(resolved, std::env::current_dir()?.join("temp"));
        Ok(())
    }

    #[test]
    fn test_relative_work_dir_writes_absolute_manifest_entries() -> Result<()> {
        let source = tempdir()?;
        // Created under the current directory and addressed relative to it
        let work = tempfile::tempdir_in(".")?;
        let relative = PathBuf::from(work.path().file_name().unwrap());
        assert!(relative.is_relative());
        write_capture(source.path(), "0,-1,0\n0,0,1000\n1,1,3000\n2,2,4500\n")?;

        let mut settings = settings(source.path(), &relative);
        settings.ffmpeg = PathBuf::from("definitely-not-a-real-ffmpeg-binary");
        let pipeline = Pipeline::new(SessionConfig::default(), settings)?;
        assert!(pipeline.run_with(&SolidDecoder).is_err());

        let manifest = fs::read_to_string(work.path().join(MANIFEST_FILE))?;
        let frames: Vec<&str> = manifest
            .lines()
            .filter_map(|line| line.strip_prefix("file '"))
            .filter_map(|rest| rest.strip_suffix('\''))
            .collect();

        assert_eq!(frames.len(), 3);
        for frame in frames {
            assert!(Path::new(frame).is_absolute(), "{} is relative", frame);
            assert!(Path::new(frame).exists(), "{} does not exist", frame);
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_cleanup_failure_does_not_fail_the_run() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let source = tempdir()?;
        let root = tempdir()?;
        let work = root.path().join("temp");
        write_capture(source.path(), "0,-1,0\n0,0,1000\n1,1,3000\n2,2,4500\n")?;

        // Encoder that succeeds but takes the working area with it
        let encoder = root.path().join("encode.sh");
        fs::write(&encoder, format!("#!/bin/sh\nrm -rf '{}'\n", work.display()))?;
        fs::set_permissions(&encoder, fs::Permissions::from_mode(0o755))?;

        let mut settings = settings(source.path(), &work);
        settings.ffmpeg = encoder;
        let config = SessionConfig::new(30.0, root.path().join("out.mp4").to_string_lossy(), 440.0)?;
        let pipeline = Pipeline::new(config, settings)?;

        let summary = pipeline.run_with(&SolidDecoder)?;

        assert_eq!(summary.cleanup_warnings.len(), 1);
        assert!(summary.cleanup_warnings[0].contains("cleanup of"));
        // The source is still drained after the purge failed
        assert_eq!(fs::read_dir(source.path())?.count(), 0);
        Ok(())
    }
}
