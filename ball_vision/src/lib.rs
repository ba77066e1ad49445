// THEORY:
// This file is the main entry point for the `ball_vision` library crate.
// It exposes the detector as two explicit stages:
//
// 1.  `BallPipeline` (per frame): colour segmentation, blob scoring, and the
//     geometric and temporal gates, producing one `DetectionRecord` per frame.
// 2.  `TrajectoryReconstructor` (per video): gap filling and backward
//     extrapolation over the finished record sequence.
//
// Around those sit the I/O collaborators (frame sources and sinks, the record
// CSV, overlay rendering) and the `BatchRunner` for processing several videos
// at once. The stage internals live in `core_modules`.

pub mod batch;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod overlay;
pub mod pipeline;
pub mod records_io;
pub mod source;

pub use batch::{BatchRunner, JobReport, VideoJob};
pub use config::PipelineConfig;
pub use core_modules::color_profile::{ColorProfile, HsvRange};
pub use core_modules::record::{DetectionRecord, FrameDims, Point};
pub use core_modules::trajectory::{ReconstructionSummary, TrajectoryReconstructor};
pub use error::{ConfigError, Error, RecordsError, Result, SourceError};
pub use pipeline::{run_detection, BallPipeline, DetectionRun};
