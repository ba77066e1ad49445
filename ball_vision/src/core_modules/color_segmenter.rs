// THEORY:
// The `ColorSegmenter` is the first stage of the per-frame detector. It turns a
// full-colour frame into a binary `Mask` of "ball coloured" pixels.
//
// Steps, in order:
// 1.  **Working resolution**: frames wider than the working width are shrunk
//     (aspect preserved). Every later per-frame coordinate lives in this space;
//     the pipeline maps results back using the original/working size ratio.
// 2.  **Smoothing**: a small Gaussian blur knocks down sensor noise that would
//     otherwise fragment the mask into dust.
// 3.  **HSV threshold**: each pixel is converted to hue/saturation/value and
//     kept if it lands in any range of the active `ColorProfile` (or in the
//     operator's tuned ranges, when supplied).
// 4.  **Cleaning**: morphological opening with an elliptical element removes
//     isolated specks, then one dilation fattens the survivors.
//
// The segmenter is stateless and pure: the same frame and profile always give
// the same mask. Steps 3 and 4 run on OpenCV when the `opencv` feature is on,
// and fall back to the pure-Rust `Mask` morphology if OpenCV reports an error.

use crate::config::SegmentationConfig;
use crate::core_modules::color_profile::{ColorProfile, HsvRange};
use crate::core_modules::mask::{Mask, StructuringElement};
use crate::core_modules::pixel::pixel::Pixel;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::borrow::Cow;

pub struct ColorSegmenter {
    resize_width: u32,
    blur_sigma: f32,
    element: StructuringElement,
    custom_ranges: Vec<HsvRange>,
}

impl ColorSegmenter {
    pub fn new(settings: &SegmentationConfig) -> Self {
        Self {
            resize_width: settings.resize_width,
            blur_sigma: settings.blur_sigma,
            element: StructuringElement::ellipse(settings.kernel_size),
            custom_ranges: settings.custom_ranges.clone(),
        }
    }

    /// The size frames of `width`x`height` are processed at.
    pub fn working_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.resize_width || width == 0 {
            return (width, height);
        }
        let scale = self.resize_width as f64 / width as f64;
        let scaled_height = ((height as f64 * scale).round() as u32).max(1);
        (self.resize_width, scaled_height)
    }

    /// The HSV ranges a pixel is tested against for `profile`.
    pub fn ranges_for(&self, profile: ColorProfile) -> &[HsvRange] {
        if self.custom_ranges.is_empty() {
            profile.ranges()
        } else {
            &self.custom_ranges
        }
    }

    /// Produces the cleaned binary mask of `frame` at working resolution.
    pub fn segment(&self, frame: &RgbImage, profile: ColorProfile) -> Mask {
        let (width, height) = self.working_dimensions(frame.width(), frame.height());
        let working: Cow<'_, RgbImage> = if (width, height) == frame.dimensions() {
            Cow::Borrowed(frame)
        } else {
            Cow::Owned(imageops::resize(frame, width, height, FilterType::Triangle))
        };

        let smoothed: Cow<'_, RgbImage> = if self.blur_sigma > 0.0 {
            Cow::Owned(imageops::blur(&*working, self.blur_sigma))
        } else {
            working
        };

        self.threshold_and_clean(&smoothed, self.ranges_for(profile))
    }

    #[cfg(feature = "opencv")]
    fn threshold_and_clean(&self, frame: &RgbImage, ranges: &[HsvRange]) -> Mask {
        match crate::core_modules::opencv_ops::segment(frame, ranges, self.element.size()) {
            Ok(mask) => mask,
            Err(error) => {
                tracing::warn!(%error, "OpenCV segmentation failed, using the Rust kernels");
                self.threshold_and_clean_in_rust(frame, ranges)
            }
        }
    }

    #[cfg(not(feature = "opencv"))]
    fn threshold_and_clean(&self, frame: &RgbImage, ranges: &[HsvRange]) -> Mask {
        self.threshold_and_clean_in_rust(frame, ranges)
    }

    fn threshold_and_clean_in_rust(&self, frame: &RgbImage, ranges: &[HsvRange]) -> Mask {
        let thresholded = Mask::from_fn(frame.width(), frame.height(), |x, y| {
            let hsv = Pixel::from(frame.get_pixel(x, y)).to_hsv();
            ranges.iter().any(|range| range.contains(&hsv))
        });
        thresholded.open(&self.element).dilate(&self.element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame_with_disc(width: u32, height: u32, centre: (i32, i32), radius: i32, colour: Rgb<u8>) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let dx = x as i32 - centre.0;
            let dy = y as i32 - centre.1;
            if dx * dx + dy * dy <= radius * radius {
                colour
            } else {
                Rgb([30, 90, 40])
            }
        })
    }

    fn segmenter() -> ColorSegmenter {
        ColorSegmenter::new(&SegmentationConfig::default())
    }

    #[test]
    fn segmentation_is_deterministic() {
        let frame = frame_with_disc(200, 150, (100, 70), 12, Rgb([250, 250, 250]));
        let segmenter = segmenter();
        let first = segmenter.segment(&frame, ColorProfile::White);
        let second = segmenter.segment(&frame, ColorProfile::White);
        assert_eq!(first, second);
    }

    #[test]
    fn white_disc_is_isolated_on_green_field() {
        let frame = frame_with_disc(200, 150, (100, 70), 12, Rgb([250, 250, 250]));
        let mask = segmenter().segment(&frame, ColorProfile::White);
        assert_eq!((mask.width(), mask.height()), (200, 150));
        assert!(mask.get(100, 70));
        assert!(!mask.get(10, 10));
        assert!(!mask.get(180, 140));
    }

    #[test]
    fn red_profile_ignores_white_ball() {
        let frame = frame_with_disc(200, 150, (100, 70), 12, Rgb([250, 250, 250]));
        let mask = segmenter().segment(&frame, ColorProfile::Red);
        assert!(mask.is_empty());
    }

    #[test]
    fn red_disc_matches_red_profile() {
        let frame = frame_with_disc(200, 150, (60, 90), 10, Rgb([210, 20, 25]));
        let mask = segmenter().segment(&frame, ColorProfile::Red);
        assert!(mask.get(60, 90));
    }

    #[test]
    fn wide_frames_are_downscaled_to_working_width() {
        let segmenter = segmenter();
        assert_eq!(segmenter.working_dimensions(1920, 1080), (960, 540));
        assert_eq!(segmenter.working_dimensions(640, 480), (640, 480));

        let frame = frame_with_disc(1920, 1080, (960, 540), 30, Rgb([255, 255, 255]));
        let mask = segmenter.segment(&frame, ColorProfile::White);
        assert_eq!((mask.width(), mask.height()), (960, 540));
        assert!(mask.get(480, 270));
    }

    #[test]
    fn speckle_noise_is_cleaned_away() {
        let mut frame = RgbImage::from_pixel(100, 100, Rgb([20, 20, 20]));
        frame.put_pixel(20, 20, Rgb([255, 255, 255]));
        frame.put_pixel(70, 35, Rgb([255, 255, 255]));
        let mask = segmenter().segment(&frame, ColorProfile::White);
        assert!(mask.is_empty());
    }

    #[test]
    fn rust_kernels_keep_disc_and_drop_speck() {
        let mut frame = frame_with_disc(120, 90, (60, 45), 10, Rgb([250, 250, 250]));
        frame.put_pixel(5, 5, Rgb([255, 255, 255]));
        let segmenter = segmenter();
        let mask = segmenter.threshold_and_clean_in_rust(&frame, ColorProfile::White.ranges());
        assert!(mask.get(60, 45));
        assert!(!mask.get(5, 5));
    }

    #[test]
    fn custom_ranges_override_profile() {
        let settings = SegmentationConfig {
            custom_ranges: vec![HsvRange::new([50, 100, 100], [70, 255, 255])],
            ..SegmentationConfig::default()
        };
        let frame = frame_with_disc(120, 120, (60, 60), 10, Rgb([20, 230, 20]));
        let mask = ColorSegmenter::new(&settings).segment(&frame, ColorProfile::White);
        assert!(mask.get(60, 60));
    }
}
