//! Directory of still images as a frame source, for offline runs.

use moodlens_core::{Frame, FrameSource};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff", "webp"];

#[derive(Error, Debug)]
pub enum ImageSequenceError {
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },
}

/// Replays the images of a directory in file-name order, converted to
/// grayscale.
pub struct ImageSequence {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    sequence: u32,
}

impl ImageSequence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: VecDeque::new(),
            sequence: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames not yet handed out.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

impl FrameSource for ImageSequence {
    type Error = ImageSequenceError;

    fn open(&mut self) -> Result<(), ImageSequenceError> {
        if !self.dir.is_dir() {
            return Err(ImageSequenceError::NotADirectory(self.dir.display().to_string()));
        }
        let io_err = |source| ImageSequenceError::Io {
            path: self.dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        tracing::info!(dir = %self.dir.display(), images = paths.len(), "opened image sequence");
        self.pending = paths.into();
        self.sequence = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, ImageSequenceError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path).map_err(|source| ImageSequenceError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        let frame = Frame::from_image(image.to_luma8(), self.sequence);
        self.sequence += 1;
        tracing::debug!(path = %path.display(), seq = frame.sequence, "loaded frame");
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}
