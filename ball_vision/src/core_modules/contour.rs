// THEORY:
// The `contour` module turns a binary `Mask` into the outer boundaries of its
// foreground regions, and measures those boundaries as polygons.
//
// Algorithm:
// 1.  **Outside flood fill**: Background pixels reachable from the image border
//     through 4-connected background are "outside". Background that is not
//     reachable is a hole inside some region.
// 2.  **Region labelling**: Foreground is grouped into 8-connected regions with a
//     breadth-first search. A region is *external* when one of its pixels
//     touches the image border or an outside background pixel; regions that sit
//     inside another region's hole are nested and are dropped.
// 3.  **Border following**: Each external region is traced clockwise with Moore
//     neighbour tracing, starting from its first pixel in raster order. The
//     resulting closed chain of pixel centres is the contour.
// 4.  **Polygon measures**: Area and the first-order moments come from Green's
//     theorem over the chain; perimeter is the closed polyline length. These are
//     the same quantities a polygon-based contour library reports, so a single
//     isolated pixel has zero area and zero perimeter.

use crate::core_modules::mask::Mask;
use std::collections::VecDeque;

/// Clockwise neighbour ring (image coordinates, y grows downwards).
const RING: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

fn ring_index(dx: i64, dy: i64) -> usize {
    RING.iter()
        .position(|offset| *offset == (dx, dy))
        .unwrap_or(4)
}

/// Zeroth and first order area moments of a closed polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// Centroid as (M10/M00, M01/M00), or `None` when the polygon has no area.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 == 0.0 {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// The closed outer boundary of one foreground region.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary pixel centres in tracing order. The chain is implicitly closed.
    pub points: Vec<(i64, i64)>,
    /// Number of foreground pixels in the region this contour bounds.
    pub pixel_count: usize,
}

impl Contour {
    /// Signed area-weighted moments via Green's theorem, normalised so that
    /// `m00` is non-negative regardless of tracing direction.
    pub fn moments(&self) -> Moments {
        let n = self.points.len();
        if n < 3 {
            return Moments::default();
        }

        let mut moments = Moments::default();
        for i in 0..n {
            let (x0, y0) = self.points[i];
            let (x1, y1) = self.points[(i + 1) % n];
            let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);
            let cross = x0 * y1 - x1 * y0;
            moments.m00 += cross;
            moments.m10 += (x0 + x1) * cross;
            moments.m01 += (y0 + y1) * cross;
        }
        moments.m00 /= 2.0;
        moments.m10 /= 6.0;
        moments.m01 /= 6.0;

        if moments.m00 < 0.0 {
            moments.m00 = -moments.m00;
            moments.m10 = -moments.m10;
            moments.m01 = -moments.m01;
        }
        moments
    }

    /// Enclosed polygon area.
    pub fn area(&self) -> f64 {
        self.moments().m00
    }

    /// Length of the closed boundary polyline.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                (((x1 - x0).pow(2) + (y1 - y0).pow(2)) as f64).sqrt()
            })
            .sum()
    }
}

/// Finds the outer contours of all external foreground regions in `mask`.
pub fn find_external_contours(mask: &Mask) -> Vec<Contour> {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let outside = flood_outside_background(mask);
    let mut labelled = vec![false; width * height];
    let mut contours = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            if labelled[index] || !mask.get(x as u32, y as u32) {
                continue;
            }

            let (pixel_count, is_external) = label_region(mask, &outside, &mut labelled, x, y);
            if !is_external {
                continue;
            }

            // (x, y) is the region's first pixel in raster order, so its west
            // neighbour is guaranteed to be background.
            let points = trace_boundary(mask, (x as i64, y as i64), pixel_count);
            contours.push(Contour { points, pixel_count });
        }
    }

    contours
}

/// Marks background pixels 4-connected to the image border.
fn flood_outside_background(mask: &Mask) -> Vec<bool> {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    let mut outside = vec![false; width * height];
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    let seed = |x: usize, y: usize, outside: &mut Vec<bool>, queue: &mut VecDeque<(usize, usize)>| {
        let index = y * width + x;
        if !outside[index] && !mask.get(x as u32, y as u32) {
            outside[index] = true;
            queue.push_back((x, y));
        }
    };

    for x in 0..width {
        seed(x, 0, &mut outside, &mut queue);
        seed(x, height - 1, &mut outside, &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut outside, &mut queue);
        seed(width - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        for (dx, dy) in [(0i64, 1i64), (0, -1), (1, 0), (-1, 0)] {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            seed(nx as usize, ny as usize, &mut outside, &mut queue);
        }
    }

    outside
}

/// Breadth-first labelling of one 8-connected region. Returns its pixel count
/// and whether it borders the outside background or the image edge.
fn label_region(
    mask: &Mask,
    outside: &[bool],
    labelled: &mut [bool],
    start_x: usize,
    start_y: usize,
) -> (usize, bool) {
    let width = mask.width() as i64;
    let height = mask.height() as i64;
    let mut queue: VecDeque<(i64, i64)> = VecDeque::new();
    queue.push_back((start_x as i64, start_y as i64));
    labelled[start_y * width as usize + start_x] = true;

    let mut pixel_count = 0;
    let mut is_external = false;

    while let Some((x, y)) = queue.pop_front() {
        pixel_count += 1;

        for (dx, dy) in RING {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx >= width || ny >= height {
                is_external = true;
                continue;
            }
            let index = (ny * width + nx) as usize;
            if mask.get(nx as u32, ny as u32) {
                if !labelled[index] {
                    labelled[index] = true;
                    queue.push_back((nx, ny));
                }
            } else if (dx == 0 || dy == 0) && outside[index] {
                is_external = true;
            }
        }
    }

    (pixel_count, is_external)
}

/// Moore neighbour tracing, clockwise, with a Jacob-style stop: tracing ends
/// when the start pixel is about to be left through the same first step.
fn trace_boundary(mask: &Mask, start: (i64, i64), pixel_count: usize) -> Vec<(i64, i64)> {
    let mut points = vec![start];

    let first_step = match next_boundary_pixel(mask, start, (start.0 - 1, start.1)) {
        Some(step) => step,
        None => return points,
    };

    let mut current = first_step.0;
    let mut backtrack = first_step.1;
    // Each boundary pixel can be revisited at most a handful of times (thin
    // spurs are walked out and back), so this bounds any pathological loop.
    let max_steps = 8 * pixel_count + 8;

    for _ in 0..max_steps {
        if current == start {
            match next_boundary_pixel(mask, current, backtrack) {
                Some(step) if step.0 == first_step.0 => break,
                Some(step) => {
                    points.push(current);
                    current = step.0;
                    backtrack = step.1;
                    continue;
                }
                None => break,
            }
        }

        points.push(current);
        match next_boundary_pixel(mask, current, backtrack) {
            Some(step) => {
                current = step.0;
                backtrack = step.1;
            }
            None => break,
        }
    }

    points
}

/// Sweeps clockwise around `current`, starting just after `backtrack`, and
/// returns the first foreground neighbour together with the background pixel
/// examined immediately before it.
fn next_boundary_pixel(
    mask: &Mask,
    current: (i64, i64),
    backtrack: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    let start_dir = ring_index(backtrack.0 - current.0, backtrack.1 - current.1);
    let mut previous = backtrack;

    for step in 1..=8 {
        let (dx, dy) = RING[(start_dir + step) % 8];
        let candidate = (current.0 + dx, current.1 + dy);
        if mask.get_signed(candidate.0, candidate.1) {
            return Some((candidate, previous));
        }
        previous = candidate;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc(size: u32, cx: i32, cy: i32, radius: i32) -> Mask {
        Mask::from_fn(size, size, |x, y| {
            let dx = x as i32 - cx;
            let dy = y as i32 - cy;
            dx * dx + dy * dy <= radius * radius
        })
    }

    #[test]
    fn square_contour_has_polygon_area_and_perimeter() {
        // A 4x4 block of pixels; its boundary through pixel centres is a 3x3 square.
        let mask = Mask::from_fn(10, 10, |x, y| (2..6).contains(&x) && (3..7).contains(&y));
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);

        let contour = &contours[0];
        assert_eq!(contour.pixel_count, 16);
        assert!((contour.area() - 9.0).abs() < 1e-9);
        assert!((contour.perimeter() - 12.0).abs() < 1e-9);

        let (cx, cy) = contour.moments().centroid().unwrap();
        assert!((cx - 3.5).abs() < 1e-9);
        assert!((cy - 4.5).abs() < 1e-9);
    }

    #[test]
    fn isolated_pixel_is_degenerate() {
        let mut mask = Mask::new(5, 5);
        mask.set(2, 2, true);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points, vec![(2, 2)]);
        assert_eq!(contours[0].area(), 0.0);
        assert_eq!(contours[0].perimeter(), 0.0);
        assert!(contours[0].moments().centroid().is_none());
    }

    #[test]
    fn disc_centroid_is_its_centre() {
        let mask = disc(60, 30, 25, 10);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let (cx, cy) = contours[0].moments().centroid().unwrap();
        assert!((cx - 30.0).abs() < 0.5, "cx = {cx}");
        assert!((cy - 25.0).abs() < 0.5, "cy = {cy}");
    }

    #[test]
    fn separate_regions_yield_separate_contours() {
        let a = disc(80, 20, 20, 6);
        let b = disc(80, 60, 55, 8);
        let contours = find_external_contours(&a.union(&b));
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn region_inside_a_hole_is_not_external() {
        // A ring with a dot in its hole: only the ring's outer border counts.
        let mask = Mask::from_fn(40, 40, |x, y| {
            let dx = x as i32 - 20;
            let dy = y as i32 - 20;
            let d2 = dx * dx + dy * dy;
            (d2 >= 100 && d2 <= 196) || d2 <= 4
        });
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].area() > 500.0);
    }

    #[test]
    fn region_touching_border_is_traced() {
        let mask = Mask::from_fn(10, 10, |x, y| x < 3 && y < 3);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!((contours[0].area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn diagonal_line_is_one_region_with_zero_area() {
        let mask = Mask::from_fn(10, 10, |x, y| x == y);
        let contours = find_external_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 0.0);
        assert!(contours[0].perimeter() > 0.0);
    }
}
