// THEORY:
// Everything that needs a real video codec or a GUI lives here, behind the
// `video` feature, so the library and the default binary stay pure Rust.
//
// `VideoFileSource` and `VideoFileSink` adapt OpenCV's `VideoCapture` and
// `VideoWriter` to the library's frame traits. OpenCV works in BGR; the
// library works in RGB, so every frame is converted once on the way in and
// once on the way out. The tuner is an interactive helper for picking HSV
// bounds on a single still frame.

use ball_vision::error::SourceError;
use ball_vision::source::{FrameSink, FrameSource};
use ball_vision::FrameDims;
use image::RgbImage;
use opencv::{
    core::{self, Mat, Scalar, Size},
    highgui, imgcodecs, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::path::Path;
use tracing::info;

/// Container extensions routed to OpenCV rather than the image-sequence path.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "m4v"];

pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn backend(error: opencv::Error) -> SourceError {
    SourceError::Backend(error.to_string())
}

fn path_str(path: &Path) -> Result<&str, SourceError> {
    path.to_str()
        .ok_or_else(|| SourceError::unopenable(path, "path is not valid UTF-8"))
}

pub struct VideoFileSource {
    cap: VideoCapture,
    dims: FrameDims,
    fps: f64,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let cap = VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)
            .map_err(|error| SourceError::unopenable(path, error.to_string()))?;
        if !cap.is_opened().map_err(backend)? {
            return Err(SourceError::unopenable(path, "OpenCV could not open the video"));
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH).map_err(backend)? as u32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).map_err(backend)? as u32;
        let fps = cap.get(videoio::CAP_PROP_FPS).map_err(backend)?;
        info!(path = %path.display(), width, height, fps, "opened video");

        Ok(Self {
            cap,
            dims: FrameDims::new(width, height),
            fps,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn dimensions(&self) -> FrameDims {
        self.dims
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let mut bgr = Mat::default();
        if !self.cap.read(&mut bgr).map_err(backend)? || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(backend)?;
        let found = (rgb.cols() as u32, rgb.rows() as u32);
        if found != (self.dims.width, self.dims.height) {
            return Err(SourceError::DimensionMismatch {
                expected: (self.dims.width, self.dims.height),
                found,
            });
        }

        let data = rgb.data_bytes().map_err(backend)?.to_vec();
        RgbImage::from_raw(found.0, found.1, data)
            .map(Some)
            .ok_or_else(|| SourceError::Backend("decoded frame has an unexpected layout".into()))
    }
}

/// Encodes frames into an mp4v video.
pub struct VideoFileSink {
    writer: VideoWriter,
    dims: FrameDims,
}

impl VideoFileSink {
    pub fn create(path: &Path, dims: FrameDims, fps: f64) -> Result<Self, SourceError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v').map_err(backend)?;
        let writer = VideoWriter::new(
            path_str(path)?,
            fourcc,
            fps,
            Size::new(dims.width as i32, dims.height as i32),
            true,
        )
        .map_err(backend)?;
        if !writer.is_opened().map_err(backend)? {
            return Err(SourceError::unopenable(path, "OpenCV could not create the video writer"));
        }
        Ok(Self { writer, dims })
    }
}

impl FrameSink for VideoFileSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), SourceError> {
        let (width, height) = frame.dimensions();
        if (width, height) != (self.dims.width, self.dims.height) {
            return Err(SourceError::DimensionMismatch {
                expected: (self.dims.width, self.dims.height),
                found: (width, height),
            });
        }

        let mut rgb = Mat::new_rows_cols_with_default(height as i32, width as i32, core::CV_8UC3, Scalar::all(0.0))
            .map_err(backend)?;
        rgb.data_bytes_mut().map_err(backend)?.copy_from_slice(frame.as_raw());

        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0).map_err(backend)?;
        self.writer.write(&bgr).map_err(backend)
    }

    fn finish(&mut self) -> Result<(), SourceError> {
        self.writer.release().map_err(backend)
    }
}

const TRACKBAR_WINDOW: &str = "Trackbars";
/// Trackbar name, initial position, maximum.
const TRACKBARS: [(&str, i32, i32); 6] = [
    ("LH", 0, 179),
    ("LS", 0, 255),
    ("LV", 0, 255),
    ("UH", 179, 179),
    ("US", 255, 255),
    ("UV", 255, 255),
];
const ESC: i32 = 27;

/// Interactive HSV bound picker over one still frame. Returns the chosen
/// `(lower, upper)` bounds when the user presses ESC.
pub fn tune_hsv(image_path: &Path) -> Result<([u8; 3], [u8; 3]), SourceError> {
    let image = imgcodecs::imread(path_str(image_path)?, imgcodecs::IMREAD_COLOR).map_err(backend)?;
    if image.empty() {
        return Err(SourceError::unopenable(image_path, "could not read image"));
    }

    for window in [TRACKBAR_WINDOW, "Original", "Mask", "Result"] {
        highgui::named_window(window, highgui::WINDOW_NORMAL).map_err(backend)?;
    }
    for (name, initial, max) in TRACKBARS {
        highgui::create_trackbar(name, TRACKBAR_WINDOW, None, max, None).map_err(backend)?;
        highgui::set_trackbar_pos(name, TRACKBAR_WINDOW, initial).map_err(backend)?;
    }

    let mut hsv = Mat::default();
    imgproc::cvt_color(&image, &mut hsv, imgproc::COLOR_BGR2HSV, 0).map_err(backend)?;

    let bounds = loop {
        let mut positions = [0u8; 6];
        for (slot, (name, _, _)) in positions.iter_mut().zip(TRACKBARS) {
            let value = highgui::get_trackbar_pos(name, TRACKBAR_WINDOW).map_err(backend)?;
            *slot = value.clamp(0, 255) as u8;
        }
        let lower = [positions[0], positions[1], positions[2]];
        let upper = [positions[3], positions[4], positions[5]];

        let mut mask = Mat::default();
        core::in_range(
            &hsv,
            &Scalar::new(lower[0] as f64, lower[1] as f64, lower[2] as f64, 0.0),
            &Scalar::new(upper[0] as f64, upper[1] as f64, upper[2] as f64, 0.0),
            &mut mask,
        )
        .map_err(backend)?;
        let mut result = Mat::default();
        core::bitwise_and(&image, &image, &mut result, &mask).map_err(backend)?;

        highgui::imshow("Original", &image).map_err(backend)?;
        highgui::imshow("Mask", &mask).map_err(backend)?;
        highgui::imshow("Result", &result).map_err(backend)?;

        if highgui::wait_key(1).map_err(backend)? & 0xFF == ESC {
            break (lower, upper);
        }
    };

    highgui::destroy_all_windows().map_err(backend)?;
    Ok(bounds)
}
