//! Sequential grayscale frame sources.

use crate::error::SourceError;
use crate::ffmpeg::FfmpegSource;
use fishtrack_calib::io::list_images;
use fishtrack_events::Frame;
use image::GrayImage;
use std::path::{Path, PathBuf};

/// A finite stream of frames read front to back.
pub trait FrameSource: Send {
    fn path(&self) -> &Path;

    fn frame_count(&self) -> u64;

    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> Result<(), SourceError>;
}

/// Opens a frame source for a path.
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// Directories become image sequences, everything else goes through ffmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultOpener;

impl SourceOpener for DefaultOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if path.is_dir() {
            Ok(Box::new(ImageSequenceSource::open(path)?))
        } else {
            Ok(Box::new(FfmpegSource::open(path)?))
        }
    }
}

/// A directory of still images played back in lexicographic order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    dir: PathBuf,
    images: Vec<PathBuf>,
    cursor: usize,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let images = list_images(dir).map_err(|e| SourceError::Probe {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if images.is_empty() {
            return Err(SourceError::Empty {
                path: dir.to_path_buf(),
            });
        }
        log::debug!("{}: {} image frames", dir.display(), images.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            images,
            cursor: 0,
            dimensions: None,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn path(&self) -> &Path {
        &self.dir
    }

    fn frame_count(&self) -> u64 {
        self.images.len() as u64
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.images.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .map_err(|source| SourceError::Image {
                path: path.clone(),
                source,
            })?
            .to_luma8();

        let (width, height) = image.dimensions();
        let (expected_width, expected_height) = *self.dimensions.get_or_insert((width, height));
        if (width, height) != (expected_width, expected_height) {
            return Err(SourceError::FrameSize {
                path: path.clone(),
                index: self.cursor as u64,
                width,
                height,
                expected_width,
                expected_height,
            });
        }

        let frame = Frame::new(self.cursor as u64, image);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }
}

/// Frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    path: PathBuf,
    frames: Vec<GrayImage>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(path: impl Into<PathBuf>, frames: Vec<GrayImage>) -> Self {
        Self {
            path: path.into(),
            frames,
            cursor: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let frame = self
            .frames
            .get(self.cursor)
            .map(|img| Frame::new(self.cursor as u64, img.clone()));
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.cursor = 0;
        Ok(())
    }
}
