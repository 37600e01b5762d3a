use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use frame_timing::{read_timestamp_log, write_concat_manifest, DurationModel, FinalEntry};
use slowmo::{absolute_path, print_stats, Pipeline, RunSettings, SessionConfig, StatsDocument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "slowmo")]
#[command(about = "Watches the capture drive and turns a high-speed session into a slow-motion video")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for a capture session, convert it and encode the video
    Run {
        /// How many times slower than real time the video plays
        #[arg(short, long, default_value = "30", env = "SLOWMO_SLOWDOWN")]
        slowdown: f64,

        /// Nominal capture frame rate
        #[arg(short, long, default_value = "440", env = "SLOWMO_FPS")]
        fps: f64,

        /// Output video file
        #[arg(short, long, default_value = "test_01.mp4")]
        output: String,

        /// Candidate capture roots, highest priority first (defaults to W:, Y:, X:)
        #[arg(long = "source", env = "SLOWMO_SOURCES", value_delimiter = ',')]
        sources: Vec<PathBuf>,

        /// Working directory for staged frames (defaults to ./temp)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Poll interval while waiting for capture data (milliseconds)
        #[arg(long, default_value = "1000")]
        poll_ms: u64,

        /// Give up waiting for capture data after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// ffmpeg executable
        #[arg(long, default_value = "ffmpeg", env = "SLOWMO_FFMPEG")]
        ffmpeg: PathBuf,

        /// dcraw executable used to develop raw frames
        #[arg(long, default_value = "dcraw", env = "SLOWMO_DCRAW")]
        dcraw: PathBuf,

        /// Repeat the last frame in the manifest so its duration is honoured
        #[arg(long)]
        repeat_last_frame: bool,

        /// Open the video once it is encoded
        #[arg(long)]
        open: bool,

        /// Leave the capture files on the source drive
        #[arg(long)]
        keep_source: bool,

        /// Also write the session stats to a JSON file
        #[arg(long)]
        stats_json: Option<PathBuf>,
    },

    /// Print stats for an existing timestamp log without touching any drive
    Stats {
        /// Path to the timestamp log
        #[arg(short, long)]
        log: PathBuf,

        #[arg(short, long, default_value = "30")]
        slowdown: f64,

        /// Write a concat manifest referencing frames in --frame-dir
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Directory holding the converted frames
        #[arg(long, default_value = ".")]
        frame_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slowmo=info,capture_session=info,frame_timing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            slowdown,
            fps,
            output,
            sources,
            work_dir,
            poll_ms,
            timeout_secs,
            ffmpeg,
            dcraw,
            repeat_last_frame,
            open,
            keep_source,
            stats_json,
        } => {
            let config = SessionConfig::new(slowdown, output, fps)?;

            let work_dir = match work_dir {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .context("Unable to determine current directory")?
                    .join("temp"),
            };
            let mut settings = RunSettings::with_work_dir(work_dir);
            if !sources.is_empty() {
                settings.sources = sources;
            }
            settings.poll_interval = Duration::from_millis(poll_ms);
            settings.ready_timeout = timeout_secs.map(Duration::from_secs);
            settings.ffmpeg = ffmpeg;
            settings.dcraw = dcraw;
            settings.final_entry = if repeat_last_frame {
                FinalEntry::RepeatLast
            } else {
                FinalEntry::AsIs
            };
            settings.open_output = open;
            settings.drain_source = !keep_source;

            run_session(config, settings, stats_json)
        }
        Commands::Stats {
            log,
            slowdown,
            manifest,
            frame_dir,
        } => show_stats(log, slowdown, manifest, frame_dir),
    }
}

fn run_session(config: SessionConfig, settings: RunSettings, stats_json: Option<PathBuf>) -> Result<()> {
    let pipeline = Pipeline::new(config, settings)?;
    let summary = pipeline.run()?;

    if let Some(path) = stats_json {
        StatsDocument::new(summary.stats, Some(summary.output.clone())).save(&path)?;
        println!("💾 Stats saved to: {}", path.display());
    }

    println!(
        "🎬 {} ({} frames at {} fps)",
        summary.output.display(),
        summary.stats.frame_count,
        summary.encode_fps
    );
    Ok(())
}

fn show_stats(log_path: PathBuf, slowdown: f64, manifest: Option<PathBuf>, frame_dir: PathBuf) -> Result<()> {
    if !(slowdown.is_finite() && slowdown > 0.0) {
        bail!("Slowdown factor must be a positive number, got {}", slowdown);
    }

    let log = read_timestamp_log(&log_path)
        .with_context(|| format!("Failed to read timestamp log {}", log_path.display()))?;
    let model = DurationModel::build(&log, slowdown)
        .with_context(|| format!("No frame durations in {}", log_path.display()))?;

    print_stats(&model.stats);

    if let Some(manifest) = manifest {
        let frame_dir = absolute_path(&frame_dir)?;
        write_concat_manifest(&manifest, &model.records, &frame_dir, FinalEntry::AsIs)
            .with_context(|| format!("Failed to write manifest {}", manifest.display()))?;
        println!("💾 Manifest saved to: {}", manifest.display());
    }

    Ok(())
}
