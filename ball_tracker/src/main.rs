// THEORY:
// `ball_tracker` is the command-line front end for `ball_vision`. Each
// subcommand is one step of the offline workflow:
//
//   extract-frames  video/frames ─► still images (for tuning and inspection)
//   tune            still image  ─► HSV bounds for `custom_ranges`  [video]
//   detect          video/frames ─► detections CSV, trajectory CSV, annotated output
//   interpolate     detections CSV ─► trajectory CSV
//   annotate        video/frames + CSV ─► annotated output
//   print-config    default YAML config
//
// Inputs are either a directory of frames or, with the `video` feature, a
// video file. Outputs follow the same rule: a path with a video extension is
// encoded by OpenCV, anything else is treated as a directory of PNG frames.

use anyhow::{Context, Result};
use ball_vision::overlay::{annotate, Overlay};
use ball_vision::records_io::{read_records_from_path, write_records_to_path};
use ball_vision::source::{
    extract_frames, FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource,
};
use ball_vision::{
    BatchRunner, ColorProfile, FrameDims, PipelineConfig, SourceError, TrajectoryReconstructor, VideoJob,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[cfg(feature = "video")]
mod video;

#[derive(Parser, Debug)]
#[command(name = "ball_tracker", version, about = "Detect and reconstruct a ball's trajectory in fixed-camera video")]
struct Cli {
    /// YAML configuration file; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the ball colour profile (white or red).
    #[arg(long, global = true)]
    color_profile: Option<ColorProfile>,

    /// Override the temporal gate's maximum jump, in pixels.
    #[arg(long, global = true)]
    max_jump: Option<f64>,

    /// Override how many frames to extrapolate before the first detection.
    #[arg(long, global = true)]
    back_extend: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run detection and reconstruction on one or more inputs.
    Detect {
        /// Video files or directories of frames.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Where per-input CSVs and annotated output are written.
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,

        /// Also write annotated frames (or video, with the `video` feature).
        #[arg(long)]
        render: bool,

        /// Frame rate assumed for directories of frames.
        #[arg(long, default_value_t = 30.0)]
        fps: f64,

        /// Concurrent inputs; defaults to the number of CPUs.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Fill gaps and extrapolate the start of a detections CSV.
    Interpolate {
        #[arg(long)]
        csv_in: PathBuf,
        #[arg(long)]
        csv_out: PathBuf,
    },
    /// Draw a records CSV back onto its frames.
    Annotate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
    /// Save every n-th frame as a JPEG.
    ExtractFrames {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 1)]
        step: usize,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
    /// Print the default configuration as YAML.
    PrintConfig,
    /// Pick HSV bounds interactively on a still frame.
    #[cfg(feature = "video")]
    Tune {
        #[arg(long)]
        image: PathBuf,
    },
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ball_vision=info,ball_tracker=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Loads the config file (or defaults), applies CLI overrides, validates.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(profile) = cli.color_profile {
        config.color_profile = profile;
    }
    if let Some(max_jump) = cli.max_jump {
        config.temporal_gate.max_jump = max_jump;
    }
    if let Some(frames) = cli.back_extend {
        config.reconstruction.back_extend_frames = frames;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn open_source(path: &Path, fps: f64) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(path, fps)?));
    }
    if !path.exists() {
        return Err(SourceError::unopenable(path, "no such file or directory"));
    }
    open_video_source(path)
}

fn open_sink(path: &Path, dims: FrameDims, fps: f64) -> Result<Box<dyn FrameSink + Send>, SourceError> {
    if is_video_path(path) {
        return open_video_sink(path, dims, fps);
    }
    Ok(Box::new(ImageSequenceSink::create(path)?))
}

#[cfg(feature = "video")]
fn is_video_path(path: &Path) -> bool {
    video::is_video_path(path)
}

#[cfg(not(feature = "video"))]
fn is_video_path(_path: &Path) -> bool {
    false
}

#[cfg(feature = "video")]
fn open_video_source(path: &Path) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    Ok(Box::new(video::VideoFileSource::open(path)?))
}

#[cfg(not(feature = "video"))]
fn open_video_source(path: &Path) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    Err(SourceError::unopenable(
        path,
        "not a directory of frames; build with `--features video` to read video files",
    ))
}

#[cfg(feature = "video")]
fn open_video_sink(path: &Path, dims: FrameDims, fps: f64) -> Result<Box<dyn FrameSink + Send>, SourceError> {
    Ok(Box::new(video::VideoFileSink::create(path, dims, fps)?))
}

#[cfg(not(feature = "video"))]
fn open_video_sink(path: &Path, _dims: FrameDims, _fps: f64) -> Result<Box<dyn FrameSink + Send>, SourceError> {
    Err(SourceError::unopenable(path, "writing video files needs `--features video`"))
}

fn input_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

fn annotated_path(out_dir: &Path, stem: &str, input: &Path) -> PathBuf {
    if is_video_path(input) {
        out_dir.join(format!("{stem}_annotated.mp4"))
    } else {
        out_dir.join(format!("{stem}_annotated"))
    }
}

async fn detect(
    config: PipelineConfig,
    inputs: Vec<PathBuf>,
    out_dir: PathBuf,
    render: bool,
    fps: f64,
    workers: Option<usize>,
) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let jobs: Vec<VideoJob> = inputs
        .into_iter()
        .map(|input| {
            let stem = input_stem(&input);
            let source_path = input.clone();
            let mut job = VideoJob::new(stem.clone(), config.clone(), move || open_source(&source_path, fps))
                .with_detections_csv(out_dir.join(format!("{stem}_detections.csv")))
                .with_trajectory_csv(out_dir.join(format!("{stem}_trajectory.csv")));
            if render {
                let target = annotated_path(&out_dir, &stem, &input);
                job = job.with_sink(move |dims, fps| open_sink(&target, dims, fps));
            }
            job
        })
        .collect();

    let runner = workers.map_or_else(BatchRunner::new, BatchRunner::with_workers);
    let results = runner.run(jobs).await;

    let mut failures = 0usize;
    for result in &results {
        match result {
            Ok(report) => info!(
                job = %report.name,
                frames = report.frames,
                detected = report.detected,
                interpolated = report.reconstruction.interpolated,
                extrapolated = report.reconstruction.extrapolated,
                "saved outputs"
            ),
            Err(err) => {
                failures += 1;
                error!(error = %err, "input failed");
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} inputs failed", results.len());
    }
    Ok(())
}

fn interpolate(config: &PipelineConfig, csv_in: &Path, csv_out: &Path) -> Result<()> {
    let mut records = read_records_from_path(csv_in)
        .with_context(|| format!("failed to read {}", csv_in.display()))?;
    let summary = TrajectoryReconstructor::new(&config.reconstruction).reconstruct(&mut records);
    write_records_to_path(csv_out, &records)
        .with_context(|| format!("failed to write {}", csv_out.display()))?;
    info!(
        path = %csv_out.display(),
        filled = summary.filled(),
        "saved interpolated records"
    );
    Ok(())
}

fn annotate_command(input: &Path, csv: &Path, out: &Path, fps: f64) -> Result<()> {
    let records = read_records_from_path(csv).with_context(|| format!("failed to read {}", csv.display()))?;
    let mut source = open_source(input, fps).with_context(|| format!("failed to open {}", input.display()))?;
    let mut sink = open_sink(out, source.dimensions(), source.fps())
        .with_context(|| format!("failed to create {}", out.display()))?;
    let written = annotate(&Overlay::default(), &mut source, &mut sink, &records)?;
    info!(path = %out.display(), frames = written, "saved annotated output");
    Ok(())
}

fn extract_command(input: &Path, out_dir: &Path, step: usize, fps: f64) -> Result<()> {
    let mut source = open_source(input, fps).with_context(|| format!("failed to open {}", input.display()))?;
    let saved = extract_frames(&mut source, out_dir, step)?;
    println!("Saved {saved} frames to {}", out_dir.display());
    Ok(())
}

#[cfg(feature = "video")]
fn tune_command(image: &Path) -> Result<()> {
    let (lower, upper) = video::tune_hsv(image)?;
    println!("segmentation:");
    println!("  custom_ranges:");
    println!("    - lower: [{}, {}, {}]", lower[0], lower[1], lower[2]);
    println!("      upper: [{}, {}, {}]", upper[0], upper[1], upper[2]);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Detect {
            inputs,
            out_dir,
            render,
            fps,
            workers,
        } => detect(config, inputs, out_dir, render, fps, workers).await,
        Command::Interpolate { csv_in, csv_out } => interpolate(&config, &csv_in, &csv_out),
        Command::Annotate { input, csv, out, fps } => annotate_command(&input, &csv, &out, fps),
        Command::ExtractFrames {
            input,
            out_dir,
            step,
            fps,
        } => extract_command(&input, &out_dir, step, fps),
        Command::PrintConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        #[cfg(feature = "video")]
        Command::Tune { image } => tune_command(&image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_replace_file_values() {
        let cli = Cli::parse_from([
            "ball_tracker",
            "--color-profile",
            "red",
            "--max-jump",
            "90",
            "--back-extend",
            "4",
            "print-config",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.color_profile, ColorProfile::Red);
        assert_eq!(config.temporal_gate.max_jump, 90.0);
        assert_eq!(config.reconstruction.back_extend_frames, 4);
    }

    #[test]
    fn invalid_override_is_fatal() {
        let cli = Cli::parse_from(["ball_tracker", "--max-jump=-5", "print-config"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn unknown_profile_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["ball_tracker", "--color-profile", "green", "print-config"]).is_err());
    }

    #[tokio::test]
    async fn detect_leaves_no_output_for_unopenable_input() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let result = detect(
            PipelineConfig::default(),
            vec![dir.path().join("missing")],
            out_dir.clone(),
            true,
            30.0,
            Some(1),
        )
        .await;
        assert!(result.is_err());
        assert!(!out_dir.exists());
    }

    #[tokio::test]
    async fn detect_rejects_invalid_config_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out");
        let mut config = PipelineConfig::default();
        config.segmentation.kernel_size = 4;
        let result = detect(config, vec![dir.path().to_path_buf()], out_dir.clone(), false, 30.0, None).await;
        assert!(result.is_err());
        assert!(!out_dir.exists());
    }

    #[test]
    fn interpolate_rewrites_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv_in = dir.path().join("in.csv");
        let csv_out = dir.path().join("out.csv");
        std::fs::write(&csv_in, "frame,x,y,visible\n0,10,10,1\n1,-1,-1,0\n2,30,30,1\n").unwrap();
        interpolate(&PipelineConfig::default(), &csv_in, &csv_out).unwrap();
        let records = read_records_from_path(&csv_out).unwrap();
        assert_eq!(records[1].visible_position(), Some(ball_vision::Point::new(20.0, 20.0)));
    }
}
