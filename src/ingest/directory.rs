use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Images in one directory, sorted by file name.
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    limit: Option<u64>,
    frames_read: u64,
}

impl DirectorySource {
    pub fn new(dir: &Path, limit: Option<u64>) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?
        {
            let path = entry
                .with_context(|| format!("failed to read image directory {}", dir.display()))?
                .path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)));
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no png/jpeg images in {}", dir.display()));
        }
        files.sort();
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
            limit,
            frames_read: 0,
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frames_read >= limit) {
            return Ok(None);
        }
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        let frame = Frame::open(path)?;
        self.next += 1;
        self.frames_read += 1;
        log::debug!("read {}", path.display());
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            location: self.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        Frame::Gray(image::GrayImage::new(3, 3))
            .save(dir.path().join("b.png"))
            .unwrap();
        Frame::Gray(image::GrayImage::new(5, 5))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let mut source = DirectorySource::new(dir.path(), None).unwrap();
        assert_eq!(source.files().len(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().width(), 5);
        assert_eq!(source.next_frame().unwrap().unwrap().width(), 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectorySource::new(dir.path(), None).is_err());
    }
}
