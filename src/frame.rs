//! Frame value shared by sources, operators and detectors.
//!
//! A `Frame` is an owned 8-bit pixel buffer in one of three layouts. Operators
//! take `&Frame` and return a new one, so the source frame is never mutated by
//! processing or detection. Only `Detection::render` draws in place.

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Gray(GrayImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

impl Frame {
    /// Decode an image file. Single-channel and RGBA files keep their layout,
    /// everything else is normalised to RGB.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?;
        Ok(Self::from_dynamic(decoded))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.to_dynamic()
            .save(path)
            .with_context(|| format!("failed to write image {}", path.display()))
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Frame::Gray(gray),
            DynamicImage::ImageRgba8(rgba) => Frame::Rgba(rgba),
            DynamicImage::ImageRgb8(rgb) => Frame::Rgb(rgb),
            other @ DynamicImage::ImageLumaA8(_) => Frame::Gray(other.to_luma8()),
            other => Frame::Rgb(other.to_rgb8()),
        }
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Frame::Gray(gray) => DynamicImage::ImageLuma8(gray.clone()),
            Frame::Rgb(rgb) => DynamicImage::ImageRgb8(rgb.clone()),
            Frame::Rgba(rgba) => DynamicImage::ImageRgba8(rgba.clone()),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Frame::Gray(gray) => gray.dimensions(),
            Frame::Rgb(rgb) => rgb.dimensions(),
            Frame::Rgba(rgba) => rgba.dimensions(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Frame::Gray(_) => 1,
            Frame::Rgb(_) => 3,
            Frame::Rgba(_) => 4,
        }
    }

    pub fn is_empty(&self) -> bool {
        let (w, h) = self.dimensions();
        w == 0 || h == 0
    }

    /// Luma view of the frame. Colour frames are converted, alpha is dropped.
    pub fn to_gray(&self) -> GrayImage {
        match self {
            Frame::Gray(gray) => gray.clone(),
            Frame::Rgb(rgb) => DynamicImage::ImageRgb8(rgb.clone()).to_luma8(),
            Frame::Rgba(rgba) => DynamicImage::ImageRgba8(rgba.clone()).to_luma8(),
        }
    }

    /// Three-channel view. Gray is replicated, alpha is dropped.
    pub fn to_rgb(&self) -> RgbImage {
        match self {
            Frame::Gray(gray) => DynamicImage::ImageLuma8(gray.clone()).to_rgb8(),
            Frame::Rgb(rgb) => rgb.clone(),
            Frame::Rgba(rgba) => DynamicImage::ImageRgba8(rgba.clone()).to_rgb8(),
        }
    }

    /// Apply `f` to every colour sample. Alpha samples are copied unchanged.
    pub fn map_samples<F>(&self, f: F) -> Frame
    where
        F: Fn(u8) -> u8,
    {
        match self {
            Frame::Gray(gray) => {
                let mut out = gray.clone();
                out.iter_mut().for_each(|v| *v = f(*v));
                Frame::Gray(out)
            }
            Frame::Rgb(rgb) => {
                let mut out = rgb.clone();
                out.iter_mut().for_each(|v| *v = f(*v));
                Frame::Rgb(out)
            }
            Frame::Rgba(rgba) => {
                let mut out = rgba.clone();
                for px in out.pixels_mut() {
                    for channel in px.0.iter_mut().take(3) {
                        *channel = f(*channel);
                    }
                }
                Frame::Rgba(out)
            }
        }
    }

    pub fn flipped(&self, horizontal: bool, vertical: bool) -> Frame {
        let mut out = self.clone();
        out.flip_in_place(horizontal, vertical);
        out
    }

    pub fn flip_in_place(&mut self, horizontal: bool, vertical: bool) {
        use image::imageops::{flip_horizontal_in_place, flip_vertical_in_place};

        match self {
            Frame::Gray(gray) => {
                if horizontal {
                    flip_horizontal_in_place(gray);
                }
                if vertical {
                    flip_vertical_in_place(gray);
                }
            }
            Frame::Rgb(rgb) => {
                if horizontal {
                    flip_horizontal_in_place(rgb);
                }
                if vertical {
                    flip_vertical_in_place(rgb);
                }
            }
            Frame::Rgba(rgba) => {
                if horizontal {
                    flip_horizontal_in_place(rgba);
                }
                if vertical {
                    flip_vertical_in_place(rgba);
                }
            }
        }
    }
}

impl From<GrayImage> for Frame {
    fn from(image: GrayImage) -> Self {
        Frame::Gray(image)
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Frame::Rgb(image)
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        Frame::Rgba(image)
    }
}
