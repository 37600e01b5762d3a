//! Frame duration reconstruction
//!
//! Each timestamp row after the baseline becomes one [`DurationRecord`] whose
//! delta is measured against the row immediately before it in file order.
//! Deltas are never clamped: a zero or negative value means the log itself is
//! non-monotonic, and that shows up in the output rather than as an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TimingError, TimingResult};
use crate::timestamps::TimestampRecord;
use crate::MICROS_PER_SECOND;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRecord {
    /// Sequence index of the row, used to name the staged frame image
    pub frame_index: i64,
    /// Capture clock difference to the previous row (microseconds)
    pub delta_micros: i64,
    /// How long the frame is shown in the output video (seconds)
    pub display_seconds: f64,
}

impl DurationRecord {
    pub fn new(frame_index: i64, delta_micros: i64, slowdown: f64) -> Self {
        Self {
            frame_index,
            delta_micros,
            display_seconds: slowdown * delta_micros as f64 / MICROS_PER_SECOND,
        }
    }

    /// True when the log went backwards or repeated a timestamp here
    pub fn is_non_positive(&self) -> bool {
        self.delta_micros <= 0
    }
}

/// Build one duration record per non-baseline row, in log order.
///
/// A log with only the baseline row yields no records. A log with no rows at
/// all has no baseline and is rejected.
pub fn build_duration_records(
    log: &[TimestampRecord],
    slowdown: f64,
) -> TimingResult<Vec<DurationRecord>> {
    let (baseline, rest) = log.split_first().ok_or(TimingError::EmptyLog)?;

    let mut previous_micros = baseline.capture_micros;
    let mut records = Vec::with_capacity(rest.len());

    // Row numbers are 1-based and the baseline is row 1
    for (row_number, row) in (2..).zip(rest) {
        let delta = row
            .capture_micros
            .checked_sub(previous_micros)
            .ok_or_else(|| TimingError::MalformedRow {
                line: row_number,
                reason: format!(
                    "capture micros {} is out of range of the previous row ({})",
                    row.capture_micros, previous_micros
                ),
            })?;
        records.push(DurationRecord::new(row.sequence_index, delta, slowdown));
        previous_micros = row.capture_micros;
    }

    let non_positive = records.iter().filter(|r| r.is_non_positive()).count();
    if non_positive > 0 {
        warn!(
            "{} of {} frame deltas are zero or negative; timestamp log is not monotonic",
            non_positive,
            records.len()
        );
    }
    debug!("Built {} duration records (slowdown {}x)", records.len(), slowdown);

    Ok(records)
}

/// Aggregate timing figures for a capture session, for display only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Mean delta between consecutive frames (seconds)
    pub mean_delta_seconds: f64,
    /// Capture rate implied by the mean delta
    pub implied_input_fps: f64,
    /// Playback rate implied by the mean delta and slowdown, before any ceiling
    pub implied_output_fps: f64,
    pub frame_count: usize,
    /// Length of the output video if every frame keeps its display duration
    pub output_length_seconds: f64,
    pub slowdown: f64,
    /// Frames whose delta was zero or negative
    pub non_positive_deltas: usize,
}

impl SessionStats {
    /// Compute stats over a record sequence. An empty sequence has no mean
    /// and is reported as [`TimingError::EmptyLog`].
    pub fn from_records(records: &[DurationRecord], slowdown: f64) -> TimingResult<Self> {
        if records.is_empty() {
            return Err(TimingError::EmptyLog);
        }

        let frame_count = records.len();
        let total_micros: i128 = records.iter().map(|r| i128::from(r.delta_micros)).sum();
        let mean_delta_seconds = (total_micros as f64 / frame_count as f64) / MICROS_PER_SECOND;
        let implied_input_fps = 1.0 / mean_delta_seconds;

        Ok(Self {
            mean_delta_seconds,
            implied_input_fps,
            implied_output_fps: implied_input_fps / slowdown,
            frame_count,
            output_length_seconds: frame_count as f64 * mean_delta_seconds * slowdown,
            slowdown,
            non_positive_deltas: records.iter().filter(|r| r.is_non_positive()).count(),
        })
    }

    /// Whether the fps figures are meaningful (mean delta strictly positive)
    pub fn has_finite_rates(&self) -> bool {
        self.implied_input_fps.is_finite() && self.implied_input_fps > 0.0
    }
}

/// Records and stats for one timestamp log
pub struct DurationModel {
    pub records: Vec<DurationRecord>,
    pub stats: SessionStats,
}

impl DurationModel {
    /// Build the records and their stats in one step
    pub fn build(log: &[TimestampRecord], slowdown: f64) -> TimingResult<Self> {
        let records = build_duration_records(log, slowdown)?;
        let stats = SessionStats::from_records(&records, slowdown)?;
        Ok(Self { records, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_from(micros: &[i64]) -> Vec<TimestampRecord> {
        micros
            .iter()
            .enumerate()
            .map(|(i, &m)| TimestampRecord::new(i as i64 - 1, m))
            .collect()
    }

    fn approx(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn test_one_record_per_row_after_baseline() {
        let log = log_from(&[500, 900, 1_700, 2_000, 2_600]);
        let slowdown = 12.5;
        let records = build_duration_records(&log, slowdown).unwrap();

        assert_eq!(records.len(), log.len() - 1);
        for (i, record) in records.iter().enumerate() {
            let delta = log[i + 1].capture_micros - log[i].capture_micros;
            assert_eq!(record.delta_micros, delta);
            assert_eq!(record.frame_index, log[i + 1].sequence_index);
            assert_eq!(record.display_seconds, slowdown * delta as f64 / 1_000_000.0);
        }
    }

    #[test]
    fn test_deltas_are_consecutive_not_cumulative() {
        let log = log_from(&[0, 100, 300, 600]);
        let records = build_duration_records(&log, 1.0).unwrap();
        let deltas: Vec<i64> = records.iter().map(|r| r.delta_micros).collect();

        assert_eq!(deltas, vec![100, 200, 300]);
    }

    #[test]
    fn test_reference_session() {
        let log = vec![
            TimestampRecord::new(-1, 0),
            TimestampRecord::new(0, 1_000),
            TimestampRecord::new(1, 3_000),
            TimestampRecord::new(2, 4_500),
        ];
        let model = DurationModel::build(&log, 30.0).unwrap();

        let deltas: Vec<i64> = model.records.iter().map(|r| r.delta_micros).collect();
        assert_eq!(deltas, vec![1_000, 2_000, 1_500]);

        let display: Vec<f64> = model.records.iter().map(|r| r.display_seconds).collect();
        assert!(approx(display[0], 0.03, 1e-12));
        assert!(approx(display[1], 0.06, 1e-12));
        assert!(approx(display[2], 0.045, 1e-12));

        let stats = model.stats;
        assert_eq!(stats.frame_count, 3);
        assert!(approx(stats.mean_delta_seconds, 0.0015, 1e-12));
        assert!(approx(stats.implied_input_fps, 666.666_666, 1e-3));
        assert!(approx(stats.implied_output_fps, 22.222_222, 1e-3));
        assert!(approx(stats.output_length_seconds, 0.135, 1e-9));
        assert_eq!(stats.non_positive_deltas, 0);
        assert!(stats.has_finite_rates());
    }

    #[test]
    fn test_frame_index_follows_log_not_position() {
        let log = vec![
            TimestampRecord::new(40, 0),
            TimestampRecord::new(41, 10),
            TimestampRecord::new(45, 20),
        ];
        let records = build_duration_records(&log, 1.0).unwrap();
        let frames: Vec<i64> = records.iter().map(|r| r.frame_index).collect();

        assert_eq!(frames, vec![41, 45]);
    }

    #[test]
    fn test_negative_and_zero_deltas_pass_through() {
        let log = log_from(&[1_000, 2_000, 1_500, 1_500]);
        let records = build_duration_records(&log, 30.0).unwrap();

        assert_eq!(records[1].delta_micros, -500);
        assert!(approx(records[1].display_seconds, -0.015, 1e-12));
        assert_eq!(records[2].delta_micros, 0);
        assert_eq!(records[2].display_seconds, 0.0);

        let stats = SessionStats::from_records(&records, 30.0).unwrap();
        assert_eq!(stats.non_positive_deltas, 2);
    }

    #[test]
    fn test_baseline_only_log_has_no_records() {
        let log = log_from(&[123]);
        let records = build_duration_records(&log, 30.0).unwrap();
        assert!(records.is_empty());

        let err = SessionStats::from_records(&records, 30.0).unwrap_err();
        assert!(matches!(err, TimingError::EmptyLog));
        assert!(matches!(DurationModel::build(&log, 30.0), Err(TimingError::EmptyLog)));
    }

    #[test]
    fn test_empty_log_is_rejected() {
        let err = build_duration_records(&[], 30.0).unwrap_err();
        assert!(matches!(err, TimingError::EmptyLog));
    }

    #[test]
    fn test_zero_mean_gives_non_finite_rates() {
        let log = log_from(&[100, 100, 100]);
        let model = DurationModel::build(&log, 10.0).unwrap();

        assert_eq!(model.stats.mean_delta_seconds, 0.0);
        assert!(!model.stats.has_finite_rates());
        assert_eq!(model.stats.output_length_seconds, 0.0);
    }

    #[test]
    fn test_delta_outside_clock_range_is_rejected() {
        let log = log_from(&[0, i64::MIN, i64::MAX]);

        match build_duration_records(&log, 30.0) {
            Err(TimingError::MalformedRow { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    #[test]
    fn test_stats_over_very_large_deltas() {
        let log = log_from(&[i64::MIN, -1, i64::MAX - 1]);
        let model = DurationModel::build(&log, 1.0).unwrap();

        assert_eq!(model.records[0].delta_micros, i64::MAX);
        assert_eq!(model.records[1].delta_micros, i64::MAX);
        assert!(approx(
            model.stats.mean_delta_seconds,
            i64::MAX as f64 / 1_000_000.0,
            1.0
        ));
        assert!(model.stats.has_finite_rates());
    }
}
