// THEORY:
// The `record` module holds the "dumb" data containers that flow out of the
// per-frame detector and into trajectory reconstruction.
//
// A `DetectionRecord` is produced for every frame, in order, whether or not a
// ball was found. Invisible records always carry the (-1, -1) sentinel; the
// constructors are the only way to build one, so the sentinel cannot drift
// out of sync with the visibility flag.

use serde::{Deserialize, Serialize};

/// Coordinate written for frames where no ball is visible.
pub const SENTINEL: f64 = -1.0;

/// A position in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear blend: `t = 0` gives `self`, `t = 1` gives `other`.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: (1.0 - t) * self.x + t * other.x,
            y: (1.0 - t) * self.y + t * other.y,
        }
    }
}

/// Width and height of a frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The per-frame output of the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
    frame_index: u64,
    position: Point,
    visible: bool,
}

impl DetectionRecord {
    pub fn visible(frame_index: u64, position: Point) -> Self {
        Self {
            frame_index,
            position,
            visible: true,
        }
    }

    pub fn hidden(frame_index: u64) -> Self {
        Self {
            frame_index,
            position: Point::new(SENTINEL, SENTINEL),
            visible: false,
        }
    }

    /// Builds a record from an optional detection.
    pub fn from_detection(frame_index: u64, detection: Option<Point>) -> Self {
        match detection {
            Some(position) => Self::visible(frame_index, position),
            None => Self::hidden(frame_index),
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The stored coordinates; the sentinel for invisible records.
    pub fn position(&self) -> Point {
        self.position
    }

    /// The position only when the record is visible.
    pub fn visible_position(&self) -> Option<Point> {
        self.visible.then_some(self.position)
    }

    /// Marks the record visible at `position`. Used by reconstruction.
    pub(crate) fn fill(&mut self, position: Point) {
        self.position = position;
        self.visible = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_record_carries_sentinel() {
        let record = DetectionRecord::hidden(7);
        assert!(!record.is_visible());
        assert_eq!(record.position(), Point::new(-1.0, -1.0));
        assert_eq!(record.visible_position(), None);
        assert_eq!(record.frame_index(), 7);
    }

    #[test]
    fn lerp_endpoints_are_exact() {
        let a = Point::new(10.0, 10.0);
        let b = Point::new(30.0, 30.0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Point::new(20.0, 20.0));
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Point::new(0.0, 0.0).distance_to(&Point::new(3.0, 4.0)), 5.0);
    }
}
