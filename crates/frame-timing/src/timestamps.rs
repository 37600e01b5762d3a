//! Timestamp log parsing
//!
//! The capture device writes one comma-separated row per frame. Column 0 is
//! ignored, column 1 holds the frame's sequence index and column 2 the capture
//! clock reading in microseconds. Rows are kept in file order.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TimingError, TimingResult};

const SEQUENCE_COLUMN: usize = 1;
const MICROS_COLUMN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRecord {
    /// Frame ordinal as recorded by the device, not necessarily contiguous
    pub sequence_index: i64,
    /// Capture clock reading in microseconds
    pub capture_micros: i64,
}

impl TimestampRecord {
    pub fn new(sequence_index: i64, capture_micros: i64) -> Self {
        Self {
            sequence_index,
            capture_micros,
        }
    }
}

/// Read and parse a timestamp log from disk
pub fn read_timestamp_log(path: &Path) -> TimingResult<Vec<TimestampRecord>> {
    let text = fs::read_to_string(path)?;
    let rows = parse_timestamp_log(&text)?;
    debug!("Read {} timestamp rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parse timestamp log text. Blank lines are skipped; anything else that does
/// not carry integer sequence and micros columns is rejected.
pub fn parse_timestamp_log(text: &str) -> TimingResult<Vec<TimestampRecord>> {
    let mut rows = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= MICROS_COLUMN {
            return Err(TimingError::MalformedRow {
                line: line_no,
                reason: format!("expected at least 3 columns, found {}", fields.len()),
            });
        }

        let sequence_index = parse_column(fields[SEQUENCE_COLUMN], line_no, "sequence index")?;
        let capture_micros = parse_column(fields[MICROS_COLUMN], line_no, "capture micros")?;
        rows.push(TimestampRecord::new(sequence_index, capture_micros));
    }

    Ok(rows)
}

fn parse_column(field: &str, line: usize, what: &str) -> TimingResult<i64> {
    field.parse::<i64>().map_err(|e| TimingError::MalformedRow {
        line,
        reason: format!("invalid {} '{}': {}", what, field, e),
    })
}
