//! Frame sources for the workbench.
//!
//! - Still image, replayed a fixed number of times (or forever)
//! - Directory of images, in file-name order
//! - Synthetic `stub://N` source for tests and demos
//!
//! Sources only read local files. URL schemes other than `stub://` are
//! rejected.

pub mod directory;
pub mod still;
pub mod synthetic;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use directory::DirectorySource;
pub use still::StillImageSource;
pub use synthetic::SyntheticSource;

pub const STUB_SCHEME: &str = "stub://";

/// Anything that yields frames one at a time.
pub trait FrameSource: Send {
    /// Human-readable description (path or URL).
    fn describe(&self) -> String;

    fn connect(&mut self) -> Result<()> {
        log::info!("{}: connected", self.describe());
        Ok(())
    }

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;

    /// True when the frames come from a live camera and are mirrored.
    fn is_camera(&self) -> bool {
        false
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub location: String,
}

/// Pick a source for `location`: `stub://N`, a directory, or an image file.
///
/// `max_frames` caps sources that would otherwise repeat forever.
pub fn open_source(location: &str, max_frames: Option<u64>) -> Result<Box<dyn FrameSource>> {
    if !is_local_location(location) {
        return Err(anyhow!(
            "frame sources only support local paths and {STUB_SCHEME} (got {location})"
        ));
    }
    if location.starts_with(STUB_SCHEME) {
        return Ok(Box::new(SyntheticSource::from_url(location, max_frames)?));
    }
    let path = Path::new(location);
    if path.is_dir() {
        Ok(Box::new(DirectorySource::new(path, max_frames)?))
    } else {
        Ok(Box::new(StillImageSource::open(path, max_frames.or(Some(1)))?))
    }
}

fn is_local_location(location: &str) -> bool {
    if location.trim().is_empty() {
        return false;
    }
    location.starts_with(STUB_SCHEME) || !location.contains("://")
}
