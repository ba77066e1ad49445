// THEORY:
// The `trajectory` module is the second, offline stage of the system. Where the
// per-frame detector only ever sees one frame and its accepted history, the
// `TrajectoryReconstructor` sees the whole finished record sequence at once and
// turns a patchy list of detections into a continuous path.
//
// Every visible record is an "anchor". Two rules rewrite the sequence:
// 1.  **Gap filling**: between two consecutive anchors the ball is assumed to
//     move in a straight line at constant speed, so every hidden frame in the
//     gap gets the linear blend of the two anchor positions.
// 2.  **Backward extrapolation**: the frames just before the first anchor (the
//     ball was already in flight but not yet picked up) are filled by running
//     a simple parabola backwards from the first anchor:
//         x = x0 + vx·t,  y = y0 + vy·t + a·t²,  with t = -k for k frames back.
//     The velocities and curvature are calibration constants, not estimates.
//
// Frames after the last anchor are left alone. With fewer than two anchors
// there is nothing to anchor a path to and the sequence is returned untouched.

use crate::config::ReconstructionConfig;
use crate::core_modules::record::{DetectionRecord, Point};
use tracing::{info, warn};

/// What a reconstruction pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructionSummary {
    /// Records that were visible before the pass.
    pub anchors: usize,
    /// Hidden records filled between two anchors.
    pub interpolated: usize,
    /// Hidden records filled before the first anchor.
    pub extrapolated: usize,
}

impl ReconstructionSummary {
    pub fn filled(&self) -> usize {
        self.interpolated + self.extrapolated
    }
}

pub struct TrajectoryReconstructor {
    back_extend_frames: u64,
    vx: f64,
    vy: f64,
    curvature: f64,
}

impl TrajectoryReconstructor {
    pub fn new(settings: &ReconstructionConfig) -> Self {
        Self {
            back_extend_frames: settings.back_extend_frames,
            vx: settings.vx,
            vy: settings.vy,
            curvature: settings.curvature,
        }
    }

    /// Position `k` frames before `origin` on the backward parabola.
    pub fn extrapolate(&self, origin: Point, k: u64) -> Point {
        let t = -(k as f64);
        Point::new(
            origin.x + self.vx * t,
            origin.y + self.vy * t + self.curvature * t * t,
        )
    }

    /// Rewrites `records` in place. Records are expected in frame order,
    /// one per frame, starting at frame 0.
    pub fn reconstruct(&self, records: &mut [DetectionRecord]) -> ReconstructionSummary {
        let anchors: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.is_visible())
            .map(|(index, _)| index)
            .collect();

        let mut summary = ReconstructionSummary {
            anchors: anchors.len(),
            ..ReconstructionSummary::default()
        };

        if anchors.len() < 2 {
            warn!(
                anchors = anchors.len(),
                frames = records.len(),
                "not enough detections to reconstruct a trajectory"
            );
            return summary;
        }

        for pair in anchors.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let from = records[start].position();
            let to = records[end].position();
            let span = (end - start) as f64;
            for index in start + 1..end {
                let t = (index - start) as f64 / span;
                records[index].fill(from.lerp(&to, t));
                summary.interpolated += 1;
            }
        }

        let first = anchors[0];
        let origin = records[first].position();
        let reach = self.back_extend_frames.min(first as u64) as usize;
        for k in 1..=reach {
            records[first - k].fill(self.extrapolate(origin, k as u64));
            summary.extrapolated += 1;
        }

        info!(
            frames = records.len(),
            anchors = summary.anchors,
            interpolated = summary.interpolated,
            extrapolated = summary.extrapolated,
            "trajectory reconstructed"
        );
        summary
    }
}
