//! Operator-facing session report

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use frame_timing::SessionStats;
use serde::{Deserialize, Serialize};

/// Stats block as printed after the manifest is written
pub fn format_stats(stats: &SessionStats) -> Vec<String> {
    let mut lines = vec![
        "🎞".to_string(),
        format!(" Average dt:   {:.4} s", stats.mean_delta_seconds),
        format!(" Average fps:  {:.1}", stats.implied_input_fps),
        format!(" Output fps:   {:.1}", stats.implied_output_fps),
        format!(" Frames:       {}", stats.frame_count),
        format!(" Video length: {:.1} s", stats.output_length_seconds),
    ];

    if stats.non_positive_deltas > 0 {
        lines.push(format!(
            "⚠️  {} frames have a zero or negative duration",
            stats.non_positive_deltas
        ));
    }
    lines
}

pub fn print_stats(stats: &SessionStats) {
    for line in format_stats(stats) {
        println!("{}", line);
    }
}

/// JSON document written by `--stats-json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsDocument {
    pub generated_at: DateTime<Utc>,
    pub output: Option<PathBuf>,
    pub stats: SessionStats,
}

impl StatsDocument {
    pub fn new(stats: SessionStats, output: Option<PathBuf>) -> Self {
        Self {
            generated_at: Utc::now(),
            output,
            stats,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize session stats to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write stats to {}", path.display()))?;
        Ok(())
    }
}
