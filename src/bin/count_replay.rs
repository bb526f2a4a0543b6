//! count_replay - run the counting engine over a recorded detection script
//!
//! The script is JSON lines, one array of detections per frame:
//! `[{"id": 12, "bbox": [x1, y1, x2, y2], "class": "sheep", "conf": 0.91}, ...]`.
//! Prints the total and average rate; `--log-json` writes the per-frame log, the
//! counted ledger and the summary.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use image::RgbImage;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use flock_counter::count::FrameLogEntry;
use flock_counter::detect::ScriptedBackend;
use flock_counter::{
    CountPolicy, CountedEntry, DetectionCapability, DetectorBackend, Frame, InclusionRegion,
    Point, SessionLog, SessionSummary, TrackingCountEngine,
};

/// Counting line used when `--line-y` is not given (two thirds down a 480 px frame).
const DEFAULT_LINE_Y: f32 = 320.0;
const DEFAULT_AREA: &str = "250,130;470,130;800,400;70,400";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    All,
    Line,
    Area,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection script (JSON lines, one frame per line).
    #[arg(long)]
    script: PathBuf,
    /// Inclusion policy.
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,
    /// Counting line ordinate for `--mode line`.
    #[arg(long)]
    line_y: Option<f32>,
    /// Area vertices for `--mode area`, as `x,y;x,y;...`.
    #[arg(long)]
    area: Option<String>,
    /// Minimum confidence for a detection to count.
    #[arg(long, default_value_t = 0.82)]
    min_confidence: f32,
    /// Target class label.
    #[arg(long, default_value = "sheep")]
    class: String,
    /// Write the per-frame session log as JSON.
    #[arg(long)]
    log_json: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReplayLog<'a> {
    mode: &'static str,
    frames: &'a [FrameLogEntry],
    counted: &'a [CountedEntry],
    summary: SessionSummary,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(0.0..=1.0).contains(&args.min_confidence) {
        return Err(anyhow!("--min-confidence must be within [0, 1]"));
    }
    let region = build_region(&args)?;
    let policy = CountPolicy {
        target_class: args.class.clone(),
        min_confidence: args.min_confidence,
    };

    let mut detector = ScriptedBackend::from_jsonl(&args.script)?;
    let frame_total = detector.len() as u64;
    let tracking = detector.supports(DetectionCapability::Tracking);
    let mut engine = TrackingCountEngine::new();
    let mut log = SessionLog::new().with_history();
    let blank = RgbImage::new(1, 1);

    for index in 1..=frame_total {
        let frame = Frame::new(index, blank.clone());
        let detections = detector.detect(&frame)?;
        let outcome = engine.process(index, &detections, &region, &policy, tracking);
        log.record(index, &outcome.counters);
    }

    let summary = log.summary();
    if let Some(path) = &args.log_json {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let replay = ReplayLog {
            mode: region.kind().as_str(),
            frames: log.entries(),
            counted: engine.counted(),
            summary: summary.clone(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &replay)?;
        log::info!("session log written to {}", path.display());
    }

    println!(
        "Process finished. Total {} counted: {}",
        policy.target_class,
        engine.total_unique()
    );
    println!("Average FPS: {:.2}", summary.average_fps);
    Ok(())
}

fn build_region(args: &Args) -> Result<InclusionRegion> {
    match args.mode {
        Mode::All => Ok(InclusionRegion::WholeFrame),
        Mode::Line => InclusionRegion::line(args.line_y.unwrap_or(DEFAULT_LINE_Y)),
        Mode::Area => {
            let spec = args.area.as_deref().unwrap_or(DEFAULT_AREA);
            InclusionRegion::area(&parse_vertices(spec)?)
        }
    }
}

fn parse_vertices(spec: &str) -> Result<Vec<Point>> {
    spec.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| anyhow!("area vertex '{}' must be x,y", pair))?;
            let x: f32 = x.trim().parse().map_err(|_| anyhow!("bad x in '{}'", pair))?;
            let y: f32 = y.trim().parse().map_err(|_| anyhow!("bad y in '{}'", pair))?;
            Ok(Point::new(x, y))
        })
        .collect()
}
