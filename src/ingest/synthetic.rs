use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{FrameSource, SourceStats, STUB_SCHEME};
use crate::frame::Frame;

pub const SYNTHETIC_WIDTH: u32 = 320;
pub const SYNTHETIC_HEIGHT: u32 = 240;
/// Side of the bright square drawn into every frame.
pub const SQUARE_SIDE: u32 = 60;

/// `stub://N` source: `N` dark frames with a bright square drifting right.
/// `stub://` without a count runs until `max_frames`, or forever.
pub struct SyntheticSource {
    url: String,
    limit: Option<u64>,
    frames_read: u64,
}

impl SyntheticSource {
    pub fn from_url(url: &str, max_frames: Option<u64>) -> Result<Self> {
        let count = url
            .strip_prefix(STUB_SCHEME)
            .ok_or_else(|| anyhow!("not a {STUB_SCHEME} url: {url}"))?;
        let count = if count.is_empty() {
            None
        } else {
            Some(
                count
                    .parse::<u64>()
                    .map_err(|_| anyhow!("invalid frame count in {url}"))?,
            )
        };
        let limit = match (count, max_frames) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Ok(Self {
            url: url.to_string(),
            limit,
            frames_read: 0,
        })
    }

    /// Top-left corner of the square in frame `index`.
    pub fn square_origin(index: u64) -> (u32, u32) {
        let travel = u64::from(SYNTHETIC_WIDTH - SQUARE_SIDE);
        let x = (20 + index * 8) % travel;
        (x as u32, (SYNTHETIC_HEIGHT - SQUARE_SIDE) / 2)
    }

    fn render(index: u64) -> RgbImage {
        let (sx, sy) = Self::square_origin(index);
        RgbImage::from_fn(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, |x, y| {
            let inside =
                (sx..sx + SQUARE_SIDE).contains(&x) && (sy..sy + SQUARE_SIDE).contains(&y);
            if inside {
                Rgb([230, 230, 230])
            } else {
                Rgb([25, 25, 25])
            }
        })
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("{} (synthetic)", self.url)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frames_read >= limit) {
            return Ok(None);
        }
        let frame = Frame::Rgb(Self::render(self.frames_read));
        self.frames_read += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            location: self.url.clone(),
        }
    }

    fn is_camera(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_and_cap_combine() {
        assert_eq!(SyntheticSource::from_url("stub://5", Some(2)).unwrap().limit, Some(2));
        assert_eq!(SyntheticSource::from_url("stub://5", None).unwrap().limit, Some(5));
        assert_eq!(SyntheticSource::from_url("stub://", None).unwrap().limit, None);
        assert!(SyntheticSource::from_url("stub://many", None).is_err());
    }

    #[test]
    fn square_is_drawn_where_reported() {
        let img = SyntheticSource::render(3);
        let (x, y) = SyntheticSource::square_origin(3);
        assert_eq!(img.get_pixel(x + 1, y + 1), &Rgb([230, 230, 230]));
        assert_eq!(img.get_pixel(0, 0), &Rgb([25, 25, 25]));
    }
}
