// THEORY:
// A `Mask` is the binary output of colour thresholding: one flag per pixel of
// the working-resolution frame. It also carries the morphology used to clean
// it up. Opening (erode, then dilate) wipes out specks smaller than the
// structuring element; a final dilation grows the surviving blobs back a
// little so their contours are smoother and easier to trace.
//
// Border handling matches the usual convention for binary morphology: pixels
// outside the image count as "set" for erosion (so blobs touching the frame
// edge are not eaten from outside) and as "unset" for dilation.

/// A binary image. `true` marks a pixel matching the target colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

/// A structuring element for morphology, stored as offsets from its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    size: u32,
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// Builds a `size`x`size` elliptical element, anchored at its centre.
    ///
    /// For size 5 this is the familiar "plus with filled middle rows":
    /// the first and last rows only keep the centre column.
    pub fn ellipse(size: u32) -> Self {
        let size = size.max(1);
        let radius = (size / 2) as i32;
        let centre = (size / 2) as f64;
        let mut offsets = Vec::new();

        for row in 0..size as i32 {
            let dy = row - radius;
            let half_width = if radius == 0 {
                0
            } else {
                let r = radius as f64;
                (centre * ((r * r - (dy * dy) as f64) / (r * r)).max(0.0).sqrt()).round() as i32
            };
            let start = (radius - half_width).max(0);
            let end = (radius + half_width + 1).min(size as i32);
            for col in start..end {
                offsets.push((col - radius, dy));
            }
        }

        Self { size, offsets }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Builds a mask by evaluating `predicate` at every pixel.
    pub fn from_fn(width: u32, height: u32, mut predicate: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if predicate(x, y) {
                    mask.set(x, y, true);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    /// Signed lookup; anything outside the image reads as `false`.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.get(x as u32, y as u32)
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = self.index(x, y);
        self.bits[index] = value;
    }

    pub fn count_set(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|bit| *bit)
    }

    /// Pixel-wise OR of two masks of equal size.
    pub fn union(&self, other: &Mask) -> Mask {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        Mask {
            width: self.width,
            height: self.height,
            bits: self.bits.iter().zip(&other.bits).map(|(a, b)| *a || *b).collect(),
        }
    }

    /// A pixel survives erosion only if every covered pixel is set.
    pub fn erode(&self, element: &StructuringElement) -> Mask {
        self.morph(element, true)
    }

    /// A pixel is set after dilation if any covered pixel is set.
    pub fn dilate(&self, element: &StructuringElement) -> Mask {
        self.morph(element, false)
    }

    /// Erosion followed by dilation with the same element.
    pub fn open(&self, element: &StructuringElement) -> Mask {
        self.erode(element).dilate(element)
    }

    fn morph(&self, element: &StructuringElement, erode: bool) -> Mask {
        let mut out = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let covered = element.offsets().iter().map(|(dx, dy)| {
                    let nx = x as i64 + *dx as i64;
                    let ny = y as i64 + *dy as i64;
                    let inside = nx >= 0 && ny >= 0 && nx < self.width as i64 && ny < self.height as i64;
                    if inside {
                        self.get(nx as u32, ny as u32)
                    } else {
                        erode
                    }
                });
                let value = if erode {
                    covered.into_iter().all(|bit| bit)
                } else {
                    covered.into_iter().any(|bit| bit)
                };
                out.set(x, y, value);
            }
        }
        out
    }
}
