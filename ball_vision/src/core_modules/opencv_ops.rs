// THEORY:
// With the `opencv` feature enabled, the hot per-frame kernels run on OpenCV's
// `imgproc` instead of the pure-Rust `mask` and `contour` modules:
//
//   threshold   cvt_color(RGB2HSV) + in_range per HSV box, boxes OR-ed together
//   cleaning    get_structuring_element(MORPH_ELLIPSE) + morphology_ex(OPEN) + dilate
//   contours    find_contours(RETR_EXTERNAL, CHAIN_APPROX_SIMPLE)
//   measures    contour_area, arc_length(closed), moments
//
// Both paths follow the same conventions (8-bit HSV with hue 0..180, elliptical
// element, polygon contours), so callers see the same `Mask` and the same
// measurements either way. The pure-Rust path stays the fallback: callers drop
// back to it whenever an OpenCV call fails.

use crate::core_modules::candidate_scorer::candidate_scorer::ContourMeasure;
use crate::core_modules::color_profile::HsvRange;
use crate::core_modules::mask::Mask;
use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Point, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};

fn rgb_to_mat(frame: &RgbImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(frame.as_raw());
    Ok(mat)
}

fn mask_to_mat(mask: &Mask) -> opencv::Result<Mat> {
    let gray = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        image::Luma([if mask.get(x, y) { 255 } else { 0 }])
    });
    let mut mat = Mat::new_rows_cols_with_default(
        mask.height() as i32,
        mask.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
    Ok(mat)
}

fn mat_to_mask(mat: &Mat) -> opencv::Result<Mask> {
    let width = mat.cols() as u32;
    let bytes = mat.data_bytes()?;
    Ok(Mask::from_fn(width, mat.rows() as u32, |x, y| {
        bytes[y as usize * width as usize + x as usize] != 0
    }))
}

fn bound(values: [u8; 3]) -> Scalar {
    Scalar::new(values[0] as f64, values[1] as f64, values[2] as f64, 0.0)
}

/// HSV threshold of an already resized and smoothed RGB frame, cleaned by an
/// elliptical opening and one dilation of `kernel_size`.
pub fn segment(frame: &RgbImage, ranges: &[HsvRange], kernel_size: u32) -> opencv::Result<Mask> {
    let rgb = rgb_to_mat(frame)?;
    let mut hsv = Mat::default();
    imgproc::cvt_color(&rgb, &mut hsv, imgproc::COLOR_RGB2HSV, 0)?;

    let mut combined = Mat::new_rows_cols_with_default(rgb.rows(), rgb.cols(), core::CV_8UC1, Scalar::all(0.0))?;
    for range in ranges {
        let mut hits = Mat::default();
        core::in_range(&hsv, &bound(range.lower), &bound(range.upper), &mut hits)?;
        let mut merged = Mat::default();
        core::max(&combined, &hits, &mut merged)?;
        combined = merged;
    }

    let size = kernel_size.max(1) as i32;
    let kernel = imgproc::get_structuring_element(imgproc::MORPH_ELLIPSE, Size::new(size, size), Point::new(-1, -1))?;
    let border = imgproc::morphology_default_border_value()?;
    let mut opened = Mat::default();
    imgproc::morphology_ex(
        &combined,
        &mut opened,
        imgproc::MORPH_OPEN,
        &kernel,
        Point::new(-1, -1),
        1,
        core::BORDER_CONSTANT,
        border,
    )?;
    let mut cleaned = Mat::default();
    imgproc::dilate(&opened, &mut cleaned, &kernel, Point::new(-1, -1), 1, core::BORDER_CONSTANT, border)?;

    mat_to_mask(&cleaned)
}

/// Measures every external contour of `mask`, in the order OpenCV reports them.
pub fn measure_external_contours(mask: &Mask) -> opencv::Result<Vec<ContourMeasure>> {
    let image = mask_to_mat(mask)?;
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours(
        &image,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;

    let mut measures = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        let moments = imgproc::moments(&contour, false)?;
        let centroid = (moments.m00 != 0.0).then(|| (moments.m10 / moments.m00, moments.m01 / moments.m00));
        measures.push(ContourMeasure {
            area: imgproc::contour_area(&contour, false)?,
            perimeter: imgproc::arc_length(&contour, true)?,
            centroid,
        });
    }
    Ok(measures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color_profile::ColorProfile;
    use crate::core_modules::contour::find_external_contours;
    use image::Rgb;

    fn disc_mask(width: u32, height: u32, cx: i64, cy: i64, radius: i64) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            (x as i64 - cx).pow(2) + (y as i64 - cy).pow(2) <= radius * radius
        })
    }

    #[test]
    fn white_disc_survives_cleaning_and_specks_do_not() {
        let mut frame = RgbImage::from_fn(160, 120, |x, y| {
            if (x as i32 - 80).pow(2) + (y as i32 - 60).pow(2) <= 144 {
                Rgb([250, 250, 250])
            } else {
                Rgb([30, 90, 40])
            }
        });
        frame.put_pixel(10, 10, Rgb([255, 255, 255]));

        let mask = segment(&frame, ColorProfile::White.ranges(), 5).unwrap();
        assert_eq!((mask.width(), mask.height()), (160, 120));
        assert!(mask.get(80, 60));
        assert!(!mask.get(10, 10));
    }

    #[test]
    fn red_boxes_are_combined() {
        let frame = RgbImage::from_pixel(40, 40, Rgb([210, 20, 25]));
        let mask = segment(&frame, ColorProfile::Red.ranges(), 5).unwrap();
        assert_eq!(mask.count_set(), 40 * 40);
    }

    #[test]
    fn measures_agree_with_pure_contours() {
        let mask = disc_mask(100, 100, 50, 45, 15);
        let measured = measure_external_contours(&mask).unwrap();
        let traced = find_external_contours(&mask);
        assert_eq!(measured.len(), 1);
        assert_eq!(traced.len(), 1);

        let (cx, cy) = measured[0].centroid.unwrap();
        assert!((cx - 50.0).abs() < 0.5 && (cy - 45.0).abs() < 0.5);
        assert!((measured[0].area - traced[0].area()).abs() / traced[0].area() < 0.02);
        assert!((measured[0].perimeter - traced[0].perimeter()).abs() / traced[0].perimeter() < 0.02);
    }

    #[test]
    fn nested_blob_is_not_external() {
        let ring = Mask::from_fn(60, 60, |x, y| {
            let d = (x as i64 - 30).pow(2) + (y as i64 - 30).pow(2);
            (144..=400).contains(&d) || d <= 9
        });
        assert_eq!(measure_external_contours(&ring).unwrap().len(), 1);
    }
}
