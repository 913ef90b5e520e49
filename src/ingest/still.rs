use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Replays one decoded image.
pub struct StillImageSource {
    path: PathBuf,
    frame: Frame,
    limit: Option<u64>,
    frames_read: u64,
}

impl StillImageSource {
    /// `limit` of `None` replays forever.
    pub fn open(path: &Path, limit: Option<u64>) -> Result<Self> {
        let frame = Frame::open(path)?;
        Ok(Self::from_frame(path, frame, limit))
    }

    pub fn from_frame(path: &Path, frame: Frame, limit: Option<u64>) -> Self {
        Self {
            path: path.to_path_buf(),
            frame,
            limit,
            frames_read: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frames_read >= limit) {
            return Ok(None);
        }
        self.frames_read += 1;
        Ok(Some(self.frame.clone()))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            location: self.describe(),
        }
    }
}
