// THEORY:
// The `pipeline` module is the top-level API of the per-frame detector. It wires
// the stages together into a single object that owns everything one run needs:
//
//   frame ─► ColorSegmenter ─► CandidateScorer ─► rescale ─► GeometricGate ─► TemporalGate ─► record
//
// 1.  **Segmentation** and **scoring** work at the working resolution and are
//     stateless.
// 2.  **Rescale**: the winning centroid is mapped back to original-frame
//     pixels using the original/working size ratio and snapped to a whole
//     pixel. Everything downstream of this point, including the output
//     records, is in original coordinates.
// 3.  **Gates**: the static region rules run first, then the jump filter.
//     Each can only turn a visible detection into a hidden one.
// 4.  **Record**: exactly one `DetectionRecord` per frame, numbered from 0 with
//     no gaps, whether or not the ball was found.
//
// The run-scoped state (frame counter, accepted history, records) lives on the
// `BallPipeline` value itself. Two pipelines never share anything, so separate
// videos can be processed side by side. Reconstruction is a separate, second
// stage over the finished records; see `core_modules::trajectory`.

use crate::config::PipelineConfig;
use crate::core_modules::candidate_scorer::candidate_scorer::CandidateScorer;
use crate::core_modules::color_segmenter::ColorSegmenter;
use crate::core_modules::geometric_gate::GeometricGate;
use crate::core_modules::record::{DetectionRecord, FrameDims, Point};
use crate::core_modules::temporal_gate::TemporalGate;
use crate::core_modules::trajectory::{ReconstructionSummary, TrajectoryReconstructor};
use crate::error::{ConfigError, Error};
use crate::overlay::Overlay;
use crate::source::{FrameSink, FrameSource};
use image::RgbImage;
use tracing::{debug, info};

/// The per-frame detector for one video.
pub struct BallPipeline {
    config: PipelineConfig,
    segmenter: ColorSegmenter,
    scorer: CandidateScorer,
    geometric_gate: GeometricGate,
    temporal_gate: TemporalGate,
    records: Vec<DetectionRecord>,
}

impl BallPipeline {
    /// Validates `config` and builds every stage from it.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            segmenter: ColorSegmenter::new(&config.segmentation),
            scorer: CandidateScorer::new(&config.candidates),
            geometric_gate: GeometricGate::from_config(&config.geometric_gate),
            temporal_gate: TemporalGate::new(config.temporal_gate.max_jump),
            records: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detects the ball in the working-resolution frame and returns its
    /// position in original coordinates, before any gate runs.
    pub fn locate(&self, frame: &RgbImage) -> Option<Point> {
        let (width, height) = frame.dimensions();
        let mask = self.segmenter.segment(frame, self.config.color_profile);
        let centroid = self.scorer.score(&mask)?;

        let scale_x = width as f64 / mask.width() as f64;
        let scale_y = height as f64 / mask.height() as f64;
        Some(Point::new(
            (centroid.x * scale_x).floor(),
            (centroid.y * scale_y).floor(),
        ))
    }

    /// Runs one frame through every stage and appends its record.
    pub fn process_frame(&mut self, frame: &RgbImage) -> DetectionRecord {
        let frame_index = self.records.len() as u64;
        let dims = FrameDims::new(frame.width(), frame.height());

        let detection = self
            .locate(frame)
            .and_then(|position| self.geometric_gate.apply(position, dims))
            .and_then(|position| self.temporal_gate.apply(position));

        let record = DetectionRecord::from_detection(frame_index, detection);
        debug!(
            frame = frame_index,
            visible = record.is_visible(),
            x = record.position().x,
            y = record.position().y,
            "frame processed"
        );
        self.records.push(record);
        record
    }

    /// Records produced so far. Always a valid, contiguous prefix.
    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    /// Positions accepted so far, oldest first.
    pub fn history(&self) -> &[Point] {
        self.temporal_gate.history()
    }

    /// Ends the run and hands back its records.
    pub fn finish(self) -> Vec<DetectionRecord> {
        let visible = self.records.iter().filter(|record| record.is_visible()).count();
        info!(
            frames = self.records.len(),
            detected = visible,
            profile = %self.config.color_profile,
            "detection run finished"
        );
        self.records
    }
}

/// Output of a complete detection run over a source.
#[derive(Debug, Clone)]
pub struct DetectionRun {
    pub dims: FrameDims,
    pub fps: f64,
    pub records: Vec<DetectionRecord>,
}

impl DetectionRun {
    pub fn detected(&self) -> usize {
        self.records.iter().filter(|record| record.is_visible()).count()
    }

    /// Runs the second stage over this run's records in place.
    pub fn reconstruct(&mut self, config: &PipelineConfig) -> ReconstructionSummary {
        TrajectoryReconstructor::new(&config.reconstruction).reconstruct(&mut self.records)
    }
}

/// Drives a pipeline over every frame of `source`. When `sink` is given, each
/// frame is written to it with the ring and the accepted path drawn on.
pub fn run_detection(
    config: PipelineConfig,
    source: &mut dyn FrameSource,
    mut sink: Option<&mut dyn FrameSink>,
) -> Result<DetectionRun, Error> {
    let dims = source.dimensions();
    let fps = source.fps();
    let overlay = Overlay::default();
    let mut pipeline = BallPipeline::new(config)?;

    while let Some(mut frame) = source.next_frame()? {
        let record = pipeline.process_frame(&frame);
        if let Some(sink) = sink.as_deref_mut() {
            overlay.draw(&mut frame, record.visible_position(), pipeline.history());
            sink.write_frame(&frame)?;
        }
    }
    if let Some(sink) = sink.as_deref_mut() {
        sink.finish()?;
    }

    Ok(DetectionRun {
        dims,
        fps,
        records: pipeline.finish(),
    })
}
