// THEORY:
// Debug rendering for a detection run. Each output frame gets a red ring
// around the ball (when it was seen in that frame) and a green polyline
// through every position accepted so far, so the growing trajectory is
// visible as the video plays.
//
// Drawing is done directly on the `RgbImage` with distance tests, which is
// all a ring and a thick segment need. Positions are snapped to whole pixels
// before drawing. Anything with a negative coordinate is a sentinel, not a
// position, and is never drawn.

use crate::core_modules::record::{DetectionRecord, Point};
use crate::error::SourceError;
use crate::source::{FrameSink, FrameSource};
use image::{Rgb, RgbImage};
use tracing::info;

pub const RING_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
pub const PATH_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);

/// Ring and path styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub ring_radius: f64,
    pub ring_thickness: f64,
    pub path_thickness: f64,
    pub ring_colour: Rgb<u8>,
    pub path_colour: Rgb<u8>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            ring_radius: 10.0,
            ring_thickness: 2.0,
            path_thickness: 2.0,
            ring_colour: RING_COLOUR,
            path_colour: PATH_COLOUR,
        }
    }
}

fn is_drawable(point: &Point) -> bool {
    point.x >= 0.0 && point.y >= 0.0
}

fn snap(point: Point) -> Point {
    Point::new(point.x.floor(), point.y.floor())
}

/// Paints every pixel in the clamped box around `(min, max)` for which
/// `inside` holds.
fn paint_where(
    frame: &mut RgbImage,
    min: (f64, f64),
    max: (f64, f64),
    colour: Rgb<u8>,
    inside: impl Fn(f64, f64) -> bool,
) {
    if frame.width() == 0 || frame.height() == 0 {
        return;
    }
    let x_end = frame.width() as f64 - 1.0;
    let y_end = frame.height() as f64 - 1.0;
    if max.0 < 0.0 || max.1 < 0.0 || min.0 > x_end || min.1 > y_end {
        return;
    }
    let x0 = min.0.max(0.0).floor() as u32;
    let y0 = min.1.max(0.0).floor() as u32;
    let x1 = max.0.min(x_end).ceil() as u32;
    let y1 = max.1.min(y_end).ceil() as u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if inside(x as f64, y as f64) {
                frame.put_pixel(x, y, colour);
            }
        }
    }
}

/// Distance from `(px, py)` to the segment `a`-`b`.
fn distance_to_segment(px: f64, py: f64, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.x + t * dx, a.y + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

impl Overlay {
    pub fn draw_ring(&self, frame: &mut RgbImage, centre: Point) {
        if !is_drawable(&centre) {
            return;
        }
        let centre = snap(centre);
        let half = self.ring_thickness / 2.0;
        let reach = self.ring_radius + half;
        paint_where(
            frame,
            (centre.x - reach, centre.y - reach),
            (centre.x + reach, centre.y + reach),
            self.ring_colour,
            |x, y| {
                let d = ((x - centre.x).powi(2) + (y - centre.y).powi(2)).sqrt();
                (d - self.ring_radius).abs() <= half
            },
        );
    }

    pub fn draw_segment(&self, frame: &mut RgbImage, from: Point, to: Point) {
        if !is_drawable(&from) || !is_drawable(&to) {
            return;
        }
        let (a, b) = (snap(from), snap(to));
        let half = self.path_thickness / 2.0;
        paint_where(
            frame,
            (a.x.min(b.x) - half, a.y.min(b.y) - half),
            (a.x.max(b.x) + half, a.y.max(b.y) + half),
            self.path_colour,
            |x, y| distance_to_segment(x, y, a, b) <= half,
        );
    }

    /// Draws the ring at `marker` (if any) and the polyline through `path`.
    pub fn draw(&self, frame: &mut RgbImage, marker: Option<Point>, path: &[Point]) {
        if let Some(marker) = marker {
            self.draw_ring(frame, marker);
        }
        for pair in path.windows(2) {
            self.draw_segment(frame, pair[0], pair[1]);
        }
    }
}

/// Re-renders the overlay for a finished (usually reconstructed) record
/// sequence onto the frames it came from. Stops at whichever of the frame
/// stream and the record list runs out first. Returns the number of frames
/// written.
pub fn annotate(
    overlay: &Overlay,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    records: &[DetectionRecord],
) -> Result<usize, SourceError> {
    let mut path: Vec<Point> = Vec::new();
    let mut written = 0usize;

    for record in records {
        let Some(mut frame) = source.next_frame()? else {
            break;
        };
        let marker = record.visible_position().filter(is_drawable).map(snap);
        if let Some(point) = marker {
            path.push(point);
        }
        overlay.draw(&mut frame, marker, &path);
        sink.write_frame(&frame)?;
        written += 1;
    }
    sink.finish()?;

    info!(frames = written, records = records.len(), points = path.len(), "annotated frames");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemorySink, InMemorySource};

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, BLACK)
    }

    #[test]
    fn ring_is_hollow() {
        let mut frame = blank(40, 40);
        Overlay::default().draw_ring(&mut frame, Point::new(20.0, 20.0));
        assert_eq!(*frame.get_pixel(30, 20), RING_COLOUR);
        assert_eq!(*frame.get_pixel(20, 10), RING_COLOUR);
        assert_eq!(*frame.get_pixel(20, 20), BLACK);
        assert_eq!(*frame.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn ring_near_the_edge_is_clipped() {
        let mut frame = blank(20, 20);
        Overlay::default().draw_ring(&mut frame, Point::new(2.0, 2.0));
        assert_eq!(*frame.get_pixel(12, 2), RING_COLOUR);
    }

    #[test]
    fn sentinel_is_never_drawn() {
        let mut frame = blank(20, 20);
        let overlay = Overlay::default();
        overlay.draw(
            &mut frame,
            Some(Point::new(-1.0, -1.0)),
            &[Point::new(-1.0, -1.0), Point::new(10.0, 10.0)],
        );
        assert!(frame.pixels().all(|pixel| *pixel == BLACK));
    }

    #[test]
    fn segment_covers_its_endpoints_and_midpoint() {
        let mut frame = blank(50, 50);
        Overlay::default().draw_segment(&mut frame, Point::new(5.0, 5.0), Point::new(45.0, 25.0));
        assert_eq!(*frame.get_pixel(5, 5), PATH_COLOUR);
        assert_eq!(*frame.get_pixel(25, 15), PATH_COLOUR);
        assert_eq!(*frame.get_pixel(45, 25), PATH_COLOUR);
        assert_eq!(*frame.get_pixel(5, 45), BLACK);
    }

    #[test]
    fn annotate_stops_at_shorter_input() {
        let frames = (0..4).map(|_| blank(60, 60)).collect();
        let mut source = InMemorySource::new(frames, 25.0);
        let mut sink = InMemorySink::default();
        let records = vec![
            DetectionRecord::visible(0, Point::new(20.0, 20.0)),
            DetectionRecord::hidden(1),
            DetectionRecord::visible(2, Point::new(40.0, 40.0)),
        ];
        let written = annotate(&Overlay::default(), &mut source, &mut sink, &records).unwrap();
        assert_eq!(written, 3);
        assert_eq!(sink.frames.len(), 3);
        // The hidden frame has neither ring nor path.
        assert!(sink.frames[1].pixels().all(|pixel| *pixel != PATH_COLOUR));
        // The last frame joins the two visible points.
        assert_eq!(*sink.frames[2].get_pixel(30, 30), PATH_COLOUR);
    }
}
