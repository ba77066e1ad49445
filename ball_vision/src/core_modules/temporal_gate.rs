// THEORY:
// The `TemporalGate` adds the only piece of memory the per-frame detector has:
// the list of positions it has already accepted during this run.
//
// A real ball cannot teleport. If a new detection lands further than
// `max_jump` pixels from the last accepted position, it is far more likely to
// be a glove, a sock or a reflection than the ball, and it is rejected.
//
// Key principles:
// 1.  **Accepted-only history**: rejected detections never enter the history,
//     so one false positive cannot drag the reference point away.
// 2.  **Strictly sequential**: the decision for frame N depends on every
//     accepted position before it. The gate must see frames in order.
// 3.  **Run scoped**: each pipeline owns its own gate. Two videos processed
//     side by side never see each other's history.
//
// There is no recovery mechanism. If the first accepted detection is wrong,
// a real ball far from it stays rejected until it comes back within reach.

use crate::core_modules::record::Point;
use tracing::debug;

pub struct TemporalGate {
    max_jump: f64,
    history: Vec<Point>,
}

impl TemporalGate {
    pub fn new(max_jump: f64) -> Self {
        Self {
            max_jump,
            history: Vec::new(),
        }
    }

    /// Every accepted position so far, oldest first.
    pub fn history(&self) -> &[Point] {
        &self.history
    }

    pub fn last_accepted(&self) -> Option<Point> {
        self.history.last().copied()
    }

    /// Accepts `position` (and records it) or rejects it as a jump.
    pub fn apply(&mut self, position: Point) -> Option<Point> {
        if let Some(last) = self.last_accepted() {
            let jump = last.distance_to(&position);
            if jump > self.max_jump {
                debug!(
                    x = position.x,
                    y = position.y,
                    jump,
                    max_jump = self.max_jump,
                    "detection rejected by temporal gate"
                );
                return None;
            }
        }
        self.history.push(position);
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_detection_is_always_accepted() {
        let mut gate = TemporalGate::new(150.0);
        let position = Point::new(1500.0, 20.0);
        assert_eq!(gate.apply(position), Some(position));
        assert_eq!(gate.history(), &[position]);
    }

    #[test]
    fn jump_beyond_threshold_is_rejected() {
        let mut gate = TemporalGate::new(150.0);
        gate.apply(Point::new(100.0, 100.0));
        assert_eq!(gate.apply(Point::new(400.0, 100.0)), None);
        assert_eq!(gate.history().len(), 1);
    }

    #[test]
    fn jump_at_threshold_is_accepted() {
        let mut gate = TemporalGate::new(150.0);
        gate.apply(Point::new(0.0, 0.0));
        assert!(gate.apply(Point::new(90.0, 120.0)).is_some());
    }

    #[test]
    fn rejected_points_do_not_move_the_reference() {
        let mut gate = TemporalGate::new(50.0);
        gate.apply(Point::new(100.0, 100.0));
        assert!(gate.apply(Point::new(300.0, 300.0)).is_none());
        // Close to the rejected outlier but far from the real reference.
        assert!(gate.apply(Point::new(290.0, 300.0)).is_none());
        assert!(gate.apply(Point::new(120.0, 110.0)).is_some());
        assert_eq!(gate.last_accepted(), Some(Point::new(120.0, 110.0)));
    }
}
