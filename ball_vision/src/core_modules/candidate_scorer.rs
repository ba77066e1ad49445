// THEORY:
// The `CandidateScorer` is the spatial selection layer. It looks at one cleaned
// mask and decides which blob, if any, is the ball.
//
// Algorithm:
// 1.  **Contour extraction**: only external contours are considered; anything
//     nested inside another blob's hole is ignored.
// 2.  **Size gate**: contours whose polygon area falls outside
//     `[min_area, max_area]` cannot be a ball at working resolution.
// 3.  **Shape gate**: the perimeter must be non-zero (a point or a line has
//     nothing to measure) and `circularity = 4π·area / perimeter²` must reach
//     `min_circularity`. Limbs, bats and line markings are long and thin and
//     fall well below it.
// 4.  **Centroid**: taken from the polygon's area moments. A zero `M00` is a
//     second degenerate case and the contour is skipped.
// 5.  **Selection**: the survivor with the largest `circularity × area` wins,
//     which prefers a big round blob over a tiny round speck.
//
// Like the blob detector it descends from, the scorer is a stateless utility:
// it has no memory of earlier frames. With the `opencv` feature the contours
// and their measures come from `imgproc`; the traced pure-Rust contours are
// the fallback.

use crate::config::CandidateConfig;
use crate::core_modules::contour::{find_external_contours, Contour};
use crate::core_modules::mask::Mask;
use crate::core_modules::record::Point;

pub mod candidate_scorer {
    use super::*; // Make the contour and mask types available.
    use std::f64::consts::PI;
    use tracing::trace;

    /// The measures of one external contour that the gates look at.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ContourMeasure {
        pub area: f64,
        pub perimeter: f64,
        /// `None` when the contour has no area.
        pub centroid: Option<(f64, f64)>,
    }

    impl From<&Contour> for ContourMeasure {
        fn from(contour: &Contour) -> Self {
            let moments = contour.moments();
            Self {
                area: moments.m00,
                perimeter: contour.perimeter(),
                centroid: moments.centroid(),
            }
        }
    }

    #[cfg(feature = "opencv")]
    fn measure_contours(mask: &Mask) -> Vec<ContourMeasure> {
        match crate::core_modules::opencv_ops::measure_external_contours(mask) {
            Ok(measures) => measures,
            Err(error) => {
                tracing::warn!(%error, "OpenCV contour search failed, tracing contours in Rust");
                traced_measures(mask)
            }
        }
    }

    #[cfg(not(feature = "opencv"))]
    fn measure_contours(mask: &Mask) -> Vec<ContourMeasure> {
        traced_measures(mask)
    }

    fn traced_measures(mask: &Mask) -> Vec<ContourMeasure> {
        find_external_contours(mask).iter().map(ContourMeasure::from).collect()
    }

    /// A contour that passed every size and shape gate.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Candidate {
        /// Polygon area of the contour, in working-resolution pixels.
        pub area: f64,
        /// Closed boundary length.
        pub perimeter: f64,
        /// 1.0 for a perfect circle, smaller for irregular or elongated shapes.
        pub circularity: f64,
        /// Area-moment centre of the region.
        pub centroid: Point,
    }

    impl Candidate {
        /// Selection score; larger and rounder wins.
        pub fn score(&self) -> f64 {
            self.circularity * self.area
        }
    }

    /// `4π·area / perimeter²`, or `None` for a zero perimeter.
    pub fn circularity(area: f64, perimeter: f64) -> Option<f64> {
        if perimeter == 0.0 {
            return None;
        }
        Some(4.0 * PI * area / (perimeter * perimeter))
    }

    pub struct CandidateScorer {
        min_area: f64,
        max_area: f64,
        min_circularity: f64,
    }

    impl CandidateScorer {
        pub fn new(settings: &CandidateConfig) -> Self {
            Self {
                min_area: settings.min_area,
                max_area: settings.max_area,
                min_circularity: settings.min_circularity,
            }
        }

        /// Runs one measured contour through the gates.
        pub fn evaluate(&self, measure: &ContourMeasure) -> Option<Candidate> {
            let ContourMeasure { area, perimeter, centroid } = *measure;
            if area < self.min_area || area > self.max_area {
                return None;
            }

            let circularity = circularity(area, perimeter)?;
            if circularity < self.min_circularity {
                trace!(area, perimeter, circularity, "contour rejected as not round enough");
                return None;
            }

            let (cx, cy) = centroid?;
            Some(Candidate {
                area,
                perimeter,
                circularity,
                centroid: Point::new(cx, cy),
            })
        }

        /// Every candidate in `mask` that survives the gates, in raster order.
        pub fn candidates(&self, mask: &Mask) -> Vec<Candidate> {
            measure_contours(mask)
                .iter()
                .filter_map(|measure| self.evaluate(measure))
                .collect()
        }

        /// The single best candidate's centroid in working coordinates, or
        /// `None` when nothing in the mask looks like a ball.
        pub fn score(&self, mask: &Mask) -> Option<Point> {
            let mut best: Option<Candidate> = None;
            for candidate in self.candidates(mask) {
                let is_better = best
                    .as_ref()
                    .is_none_or(|current| candidate.score() > current.score());
                if is_better {
                    best = Some(candidate);
                }
            }

            best.map(|winner| {
                trace!(
                    x = winner.centroid.x,
                    y = winner.centroid.y,
                    area = winner.area,
                    circularity = winner.circularity,
                    "selected ball candidate"
                );
                winner.centroid
            })
        }
    }
}
