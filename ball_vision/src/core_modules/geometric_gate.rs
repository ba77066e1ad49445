// THEORY:
// The `GeometricGate` encodes what we know about the camera: parts of the frame
// where the ball can never legitimately be, or where something ball-like keeps
// fooling the colour/shape stages (white gloves, bright pads, reflections).
//
// It is a rule cascade, not a state machine. Each `RegionRule` is a predicate
// over the detection's position in original-frame pixels, expressed as
// fractions of the frame size so the same calibration works at any
// resolution. Rules run in order and can only downgrade a detection to "not
// visible"; they never create or move one.

use crate::config::GeometricGateConfig;
use crate::core_modules::record::{FrameDims, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Rejects detections below `max_y · H`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalCrop {
    pub max_y: f64,
}

impl Default for VerticalCrop {
    fn default() -> Self {
        Self { max_y: 0.75 }
    }
}

/// Keeps only detections inside the central band `[min_x · W, max_x · W]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalLane {
    pub min_x: f64,
    pub max_x: f64,
}

impl Default for HorizontalLane {
    fn default() -> Self {
        Self {
            min_x: 0.30,
            max_x: 0.70,
        }
    }
}

/// Rejects detections inside a known false-positive rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExclusionBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for ExclusionBox {
    fn default() -> Self {
        Self {
            min_x: 0.60,
            max_x: 0.90,
            min_y: 0.35,
            max_y: 0.80,
        }
    }
}

/// One static region-of-interest rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionRule {
    VerticalCrop(VerticalCrop),
    HorizontalLane(HorizontalLane),
    ExclusionBox(ExclusionBox),
}

impl RegionRule {
    /// Whether a detection at `position` survives this rule.
    pub fn admits(&self, position: Point, dims: FrameDims) -> bool {
        let width = dims.width as f64;
        let height = dims.height as f64;
        match self {
            RegionRule::VerticalCrop(rule) => position.y <= rule.max_y * height,
            RegionRule::HorizontalLane(rule) => {
                rule.min_x * width <= position.x && position.x <= rule.max_x * width
            }
            RegionRule::ExclusionBox(rule) => {
                let inside_x = rule.min_x * width <= position.x && position.x <= rule.max_x * width;
                let inside_y = rule.min_y * height <= position.y && position.y <= rule.max_y * height;
                !(inside_x && inside_y)
            }
        }
    }
}

impl fmt::Display for RegionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionRule::VerticalCrop(_) => f.write_str("vertical crop"),
            RegionRule::HorizontalLane(_) => f.write_str("horizontal lane"),
            RegionRule::ExclusionBox(_) => f.write_str("exclusion box"),
        }
    }
}

/// Ordered cascade of region rules.
#[derive(Debug, Clone, Default)]
pub struct GeometricGate {
    rules: Vec<RegionRule>,
}

impl GeometricGate {
    pub fn new(rules: Vec<RegionRule>) -> Self {
        Self { rules }
    }

    /// Builds the cascade in its fixed order: vertical crop, lane, box.
    /// Disabled rules are simply left out.
    pub fn from_config(settings: &GeometricGateConfig) -> Self {
        let rules = [
            settings.vertical_crop.map(RegionRule::VerticalCrop),
            settings.horizontal_lane.map(RegionRule::HorizontalLane),
            settings.exclusion_box.map(RegionRule::ExclusionBox),
        ]
        .into_iter()
        .flatten()
        .collect();
        Self::new(rules)
    }

    pub fn rules(&self) -> &[RegionRule] {
        &self.rules
    }

    /// The first rule that rejects `position`, if any.
    pub fn rejecting_rule(&self, position: Point, dims: FrameDims) -> Option<&RegionRule> {
        self.rules.iter().find(|rule| !rule.admits(position, dims))
    }

    /// Passes the detection through unchanged or rejects it.
    pub fn apply(&self, position: Point, dims: FrameDims) -> Option<Point> {
        match self.rejecting_rule(position, dims) {
            Some(rule) => {
                debug!(x = position.x, y = position.y, rule = %rule, "detection rejected by geometric gate");
                None
            }
            None => Some(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_HD: FrameDims = FrameDims::new(1920, 1080);

    fn default_gate() -> GeometricGate {
        GeometricGate::from_config(&GeometricGateConfig::default())
    }

    #[test]
    fn bottom_quarter_is_rejected() {
        // 850 > 0.75 * 1080 = 810, even though x sits in the lane.
        let gate = default_gate();
        let position = Point::new(1000.0, 850.0);
        assert_eq!(gate.apply(position, FULL_HD), None);
        assert!(matches!(
            gate.rejecting_rule(position, FULL_HD),
            Some(RegionRule::VerticalCrop(_))
        ));
    }

    #[test]
    fn centre_of_lane_passes() {
        let position = Point::new(900.0, 400.0);
        assert_eq!(default_gate().apply(position, FULL_HD), Some(position));
    }

    #[test]
    fn lane_edges() {
        // Lane is [576, 1344] at 1920 wide; y = 300 sits above the exclusion box.
        let gate = default_gate();
        assert!(gate.apply(Point::new(577.0, 300.0), FULL_HD).is_some());
        assert!(gate.apply(Point::new(575.0, 300.0), FULL_HD).is_none());
        assert!(gate.apply(Point::new(1343.0, 300.0), FULL_HD).is_some());
        assert!(gate.apply(Point::new(1345.0, 300.0), FULL_HD).is_none());
    }

    #[test]
    fn exclusion_box_overlapping_lane_rejects() {
        // x = 1200 is inside the lane (<= 1344) and the box (>= 1152); y = 500 is in the box.
        let gate = default_gate();
        let position = Point::new(1200.0, 500.0);
        assert!(matches!(
            gate.rejecting_rule(position, FULL_HD),
            Some(RegionRule::ExclusionBox(_))
        ));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let settings = GeometricGateConfig {
            vertical_crop: None,
            horizontal_lane: None,
            exclusion_box: None,
        };
        let gate = GeometricGate::from_config(&settings);
        assert!(gate.rules().is_empty());
        let position = Point::new(10.0, 1070.0);
        assert_eq!(gate.apply(position, FULL_HD), Some(position));
    }
}
