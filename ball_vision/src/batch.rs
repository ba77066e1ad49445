// THEORY:
// The detector is strictly sequential inside a video: the jump filter for frame
// N needs the accepted history of frames 0..N. Parallelism therefore lives one
// level up, across videos.
//
// A `VideoJob` bundles everything one video needs (how to open its frames,
// where to write rendered frames and CSVs, and its own config). The
// `BatchRunner` runs jobs on tokio's blocking pool, never more at once than it
// has permits for, and hands results back in submission order. A job that
// fails reports its own error; the others carry on.

use crate::config::PipelineConfig;
use crate::core_modules::record::FrameDims;
use crate::core_modules::trajectory::ReconstructionSummary;
use crate::error::{Error, SourceError};
use crate::pipeline::run_detection;
use crate::records_io::write_records_to_path;
use crate::source::{FrameSink, FrameSource};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn FrameSource + Send>, SourceError> + Send>;
pub type SinkFactory =
    Box<dyn FnOnce(FrameDims, f64) -> Result<Box<dyn FrameSink + Send>, SourceError> + Send>;

/// One video to detect, reconstruct and optionally render.
pub struct VideoJob {
    pub name: String,
    pub config: PipelineConfig,
    source: SourceFactory,
    sink: Option<SinkFactory>,
    pub detections_csv: Option<PathBuf>,
    pub trajectory_csv: Option<PathBuf>,
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub name: String,
    pub frames: usize,
    pub detected: usize,
    pub reconstructed_visible: usize,
    pub reconstruction: ReconstructionSummary,
}

impl VideoJob {
    pub fn new(
        name: impl Into<String>,
        config: PipelineConfig,
        source: impl FnOnce() -> Result<Box<dyn FrameSource + Send>, SourceError> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            source: Box::new(source),
            sink: None,
            detections_csv: None,
            trajectory_csv: None,
        }
    }

    /// Renders annotated frames into the sink built by `sink` once the
    /// source's size and rate are known.
    pub fn with_sink(
        mut self,
        sink: impl FnOnce(FrameDims, f64) -> Result<Box<dyn FrameSink + Send>, SourceError> + Send + 'static,
    ) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_detections_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.detections_csv = Some(path.into());
        self
    }

    pub fn with_trajectory_csv(mut self, path: impl Into<PathBuf>) -> Self {
        self.trajectory_csv = Some(path.into());
        self
    }

    /// Runs detection then reconstruction on the current thread. The config is
    /// checked before the source or sink is opened, so a bad config leaves no
    /// output behind.
    pub fn run(self) -> Result<JobReport, Error> {
        self.config.validate()?;
        let mut source = (self.source)()?;
        let mut sink = match self.sink {
            Some(factory) => Some(factory(source.dimensions(), source.fps())?),
            None => None,
        };

        let mut run = run_detection(
            self.config.clone(),
            &mut source,
            sink.as_mut().map(|sink| sink as &mut dyn FrameSink),
        )?;
        if let Some(path) = &self.detections_csv {
            write_records_to_path(path, &run.records)?;
        }
        let detected = run.detected();

        let reconstruction = run.reconstruct(&self.config);
        if let Some(path) = &self.trajectory_csv {
            write_records_to_path(path, &run.records)?;
        }

        let report = JobReport {
            name: self.name,
            frames: run.records.len(),
            detected,
            reconstructed_visible: run.detected(),
            reconstruction,
        };
        info!(
            job = %report.name,
            frames = report.frames,
            detected = report.detected,
            reconstructed = report.reconstructed_visible,
            "job finished"
        );
        Ok(report)
    }
}

/// Runs independent video jobs concurrently.
pub struct BatchRunner {
    workers: usize,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    /// One worker per logical CPU.
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every job and returns one result per job, in submission order.
    pub async fn run(&self, jobs: Vec<VideoJob>) -> Vec<Result<JobReport, Error>> {
        info!(jobs = jobs.len(), workers = self.workers, "starting batch");
        let permits = Arc::new(Semaphore::new(self.workers));

        let tasks = jobs.into_iter().map(|job| {
            let permits = Arc::clone(&permits);
            async move {
                let name = job.name.clone();
                let _permit = permits.acquire_owned().await.map_err(|error| Error::Worker {
                    job: name.clone(),
                    reason: error.to_string(),
                })?;
                let result = tokio::task::spawn_blocking(move || job.run())
                    .await
                    .map_err(|error| Error::Worker {
                        job: name.clone(),
                        reason: error.to_string(),
                    })?;
                if let Err(error) = &result {
                    warn!(job = %name, %error, "job failed");
                }
                result
            }
        });

        join_all(tasks).await
    }
}
