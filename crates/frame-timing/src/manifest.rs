//! ffmpeg concat manifest generation
//!
//! The concat demuxer reads `file` / `duration` pairs. Every file line is
//! immediately followed by its duration line, in the order the records were
//! built, so the video timeline matches the capture log.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::durations::DurationRecord;
use crate::error::TimingResult;
use crate::FRAME_EXTENSION;

/// How the manifest ends after the last `duration` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalEntry {
    /// Exactly two lines per frame
    #[default]
    AsIs,
    /// Repeat the last frame's file line so the demuxer honours its duration
    RepeatLast,
}

/// Name of the intermediate image for a frame, e.g. `out.000042.tiff`
pub fn frame_file_name(frame_index: i64) -> String {
    format!("out.{:06}.{}", frame_index, FRAME_EXTENSION)
}

/// Format the manifest body: two lines per record, file then duration.
pub fn format_concat_manifest(records: &[DurationRecord], frame_dir: &Path) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() * 2);
    for record in records {
        lines.push(file_line(frame_dir, record.frame_index));
        lines.push(format!("duration {:08.6}", record.display_seconds));
    }
    lines
}

/// Write the manifest to `path`
pub fn write_concat_manifest(
    path: &Path,
    records: &[DurationRecord],
    frame_dir: &Path,
    final_entry: FinalEntry,
) -> TimingResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    for line in format_concat_manifest(records, frame_dir) {
        writeln!(writer, "{}", line)?;
    }

    if final_entry == FinalEntry::RepeatLast {
        if let Some(last) = records.last() {
            writeln!(writer, "{}", file_line(frame_dir, last.frame_index))?;
        }
    }

    writer.flush()?;
    debug!("Wrote concat manifest for {} frames to {}", records.len(), path.display());
    Ok(())
}

fn file_line(frame_dir: &Path, frame_index: i64) -> String {
    let frame_path = frame_dir.join(frame_file_name(frame_index));
    format!("file '{}'", quote_path(&frame_path.to_string_lossy()))
}

/// Escape single quotes for the concat demuxer's quoted strings
fn quote_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}
