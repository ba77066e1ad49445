// THEORY:
// The detector itself never touches files or codecs. It consumes frames from a
// `FrameSource` and, when asked to render, pushes annotated frames into a
// `FrameSink`. Keeping these behind traits lets the same pipeline run on a
// directory of stills, on frames held in memory (tests, embedding), or on a
// real video container through the binary's OpenCV backend.
//
// A source reports its frame size and rate up front, then yields frames in
// order until it is exhausted. Every frame must match the declared size.

use crate::core_modules::record::FrameDims;
use crate::error::SourceError;
use image::RgbImage;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions `ImageSequenceSource` picks up.
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Ordered, finite stream of RGB frames of fixed size.
pub trait FrameSource {
    fn dimensions(&self) -> FrameDims;
    fn fps(&self) -> f64;
    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError>;
}

/// Consumer of rendered frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), SourceError>;

    /// Flushes whatever the sink buffers. Called once after the last frame.
    fn finish(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn dimensions(&self) -> FrameDims {
        (**self).dimensions()
    }

    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        (**self).next_frame()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), SourceError> {
        (**self).write_frame(frame)
    }

    fn finish(&mut self) -> Result<(), SourceError> {
        (**self).finish()
    }
}

fn check_dimensions(expected: FrameDims, frame: &RgbImage) -> Result<(), SourceError> {
    if frame.dimensions() != (expected.width, expected.height) {
        return Err(SourceError::DimensionMismatch {
            expected: (expected.width, expected.height),
            found: frame.dimensions(),
        });
    }
    Ok(())
}

/// A directory of still images, read in file-name order.
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    dims: FrameDims,
    fps: f64,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|error| SourceError::unopenable(dir, error.to_string()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| SourceError::unopenable(dir, "no image files found"))?;
        let (width, height) = image::image_dimensions(first).map_err(|source| SourceError::Decode {
            path: first.clone(),
            source,
        })?;

        info!(dir = %dir.display(), frames = paths.len(), width, height, "opened image sequence");
        Ok(Self {
            paths: paths.into(),
            dims: FrameDims::new(width, height),
            fps,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn dimensions(&self) -> FrameDims {
        self.dims
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .map_err(|source| SourceError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        check_dimensions(self.dims, &frame)?;
        Ok(Some(frame))
    }
}

/// Frames already decoded into memory.
pub struct InMemorySource {
    frames: VecDeque<RgbImage>,
    dims: FrameDims,
    fps: f64,
}

impl InMemorySource {
    /// The frame size is taken from the first frame; an empty source is 0x0.
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let dims = frames
            .first()
            .map(|frame| FrameDims::new(frame.width(), frame.height()))
            .unwrap_or(FrameDims::new(0, 0));
        Self {
            frames: frames.into(),
            dims,
            fps,
        }
    }
}

impl FrameSource for InMemorySource {
    fn dimensions(&self) -> FrameDims {
        self.dims
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
        match self.frames.pop_front() {
            Some(frame) => {
                check_dimensions(self.dims, &frame)?;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

/// Writes frames as `frame_000000.png`, `frame_000001.png`, ...
pub struct ImageSequenceSink {
    dir: PathBuf,
    written: usize,
}

impl ImageSequenceSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }
}

impl FrameSink for ImageSequenceSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), SourceError> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save(&path)
            .map_err(|source| SourceError::Encode { path, source })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SourceError> {
        debug!(dir = %self.dir.display(), frames = self.written, "image sequence sink closed");
        Ok(())
    }
}

/// Collects frames in memory.
#[derive(Default)]
pub struct InMemorySink {
    pub frames: Vec<RgbImage>,
}

impl FrameSink for InMemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), SourceError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// Saves every `step`-th frame of `source` into `dir` as
/// `frame_{n:06}.jpg`, numbering the saved frames from 0. A `step` of 0 is
/// treated as 1. Returns how many frames were saved.
pub fn extract_frames(
    source: &mut dyn FrameSource,
    dir: impl AsRef<Path>,
    step: usize,
) -> Result<usize, SourceError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let step = step.max(1);

    let mut frame_index = 0usize;
    let mut saved = 0usize;
    while let Some(frame) = source.next_frame()? {
        if frame_index % step == 0 {
            let path = dir.join(format!("frame_{saved:06}.jpg"));
            frame
                .save(&path)
                .map_err(|source| SourceError::Encode { path, source })?;
            saved += 1;
        }
        frame_index += 1;
    }

    info!(dir = %dir.display(), read = frame_index, saved, "extracted frames");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, shade: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]))
    }

    #[test]
    fn in_memory_source_yields_frames_in_order() {
        let mut source = InMemorySource::new(vec![solid(4, 3, 10), solid(4, 3, 20)], 25.0);
        assert_eq!(source.dimensions(), FrameDims::new(4, 3));
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 10);
        assert_eq!(source.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 20);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn mismatched_frame_size_is_an_error() {
        let mut source = InMemorySource::new(vec![solid(4, 3, 0), solid(5, 3, 0)], 25.0);
        assert!(source.next_frame().is_ok());
        assert!(matches!(
            source.next_frame(),
            Err(SourceError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn sink_and_sequence_source_agree_on_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();
        for shade in [30u8, 60, 90] {
            sink.write_frame(&solid(8, 6, shade)).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(sink.frames_written(), 3);
        assert!(dir.path().join("frame_000002.png").exists());

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        assert_eq!(source.dimensions(), FrameDims::new(8, 6));
        let shades: Vec<u8> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|frame| frame.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![30, 60, 90]);
    }

    #[test]
    fn empty_directory_is_unopenable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 30.0),
            Err(SourceError::Unopenable { .. })
        ));
    }

    #[test]
    fn extract_frames_keeps_every_nth() {
        let frames = (0..7).map(|i| solid(6, 4, i * 10)).collect();
        let mut source = InMemorySource::new(frames, 30.0);
        let dir = tempfile::tempdir().unwrap();
        let saved = extract_frames(&mut source, dir.path(), 3).unwrap();
        assert_eq!(saved, 3);
        assert!(dir.path().join("frame_000000.jpg").exists());
        assert!(dir.path().join("frame_000002.jpg").exists());
        assert!(!dir.path().join("frame_000003.jpg").exists());
    }
}
