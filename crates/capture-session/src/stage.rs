//! Session staging
//!
//! Waits for the capture device to publish its output, then copies the
//! control log and raw frames into a private working area and develops each
//! raw frame into a TIFF next to its staged copy.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use frame_timing::FRAME_EXTENSION;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decode::{RawDecoder, RawHandle};
use crate::error::{SessionError, SessionResult};
use crate::{LOG_EXTENSION, MARKER_FILE, RAW_EXTENSION, RAW_SUFFIX_LEN};

/// How long and how often to poll for the marker file
#[derive(Debug, Clone)]
pub struct ReadyWait {
    pub interval: Duration,
    /// `None` waits until the marker appears or the process is killed
    pub timeout: Option<Duration>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ReadyWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
            cancel: None,
        }
    }
}

impl ReadyWait {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Block until the marker file exists at the source root
pub fn await_ready(source: &Path, wait: &ReadyWait) -> SessionResult<()> {
    let marker = source.join(MARKER_FILE);
    let started = Instant::now();
    let mut polls = 0u64;

    loop {
        if marker.exists() {
            info!("Capture data ready at {} after {} polls", source.display(), polls);
            return Ok(());
        }
        if wait.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if let Some(timeout) = wait.timeout {
            if started.elapsed() >= timeout {
                return Err(SessionError::ReadyTimeout {
                    root: source.to_path_buf(),
                    timeout,
                });
            }
        }

        polls += 1;
        thread::sleep(wait.interval);
    }
}

/// Make sure `path` is an existing, empty directory.
///
/// An existing directory is emptied file by file rather than recreated, so
/// anything holding the directory itself open keeps a valid target. Nested
/// directories are not descended into; finding one is an error.
pub fn prepare_working_area(path: &Path) -> SessionResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        debug!("Created working area {}", path.display());
        return Ok(());
    }

    let mut removed = 0usize;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            return Err(SessionError::NestedDirectory { path: entry.path() });
        }
        fs::remove_file(entry.path())?;
        removed += 1;
    }

    debug!("Cleared {} files from working area {}", removed, path.display());
    Ok(())
}

/// Outcome of a staging pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageReport {
    /// Files copied from the source, log included
    pub copied: usize,
    /// TIFF frames written, in the order they were converted
    pub frames: Vec<PathBuf>,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn converted(&self) -> usize {
        self.frames.len()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// Copy log and raw files from `source` into `work_dir` and convert every raw
/// frame to TIFF. The first decode failure aborts the pass.
pub fn stage_and_convert<D: RawDecoder>(
    source: &Path,
    work_dir: &Path,
    decoder: &D,
) -> SessionResult<StageReport> {
    let started = Instant::now();
    let mut report = StageReport::default();

    for name in staged_names(source)? {
        let staged = work_dir.join(&name);
        fs::copy(source.join(&name), &staged)?;
        report.copied += 1;

        if name.ends_with(RAW_EXTENSION) {
            let frame = convert_raw(&staged, &name, decoder)?;
            report.frames.push(frame);
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        "Staged {} files and converted {} frames in {:.2} s",
        report.copied,
        report.converted(),
        report.elapsed_seconds()
    );
    Ok(report)
}

/// Names of the source-root files worth staging, sorted for a stable order
fn staged_names(source: &Path) -> SessionResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!("Skipping non UTF-8 file name {:?}", entry.file_name());
            continue;
        };
        if name.ends_with(RAW_EXTENSION) || name.ends_with(LOG_EXTENSION) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// `out.000012.raw.all` -> `out.000012.tiff`
pub fn intermediate_name(raw_name: &str) -> SessionResult<String> {
    let keep = raw_name
        .chars()
        .count()
        .checked_sub(RAW_SUFFIX_LEN)
        .filter(|&n| n > 0)
        .ok_or_else(|| SessionError::RawName(raw_name.to_string()))?;

    let stem: String = raw_name.chars().take(keep).collect();
    Ok(format!("{}.{}", stem, FRAME_EXTENSION))
}

fn convert_raw<D: RawDecoder>(staged: &Path, name: &str, decoder: &D) -> SessionResult<PathBuf> {
    let output = staged.with_file_name(intermediate_name(name)?);

    // The handle only lives for this block so the staged file is released
    // before the next frame is opened.
    let rgb = {
        let mut handle = decoder.open(staged)?;
        handle.postprocess()?
    };

    rgb.save_with_format(&output, ImageFormat::Tiff)
        .map_err(|e| SessionError::decode(staged, e))?;
    debug!("Converted {} -> {}", staged.display(), output.display());
    Ok(output)
}
