//! Filter pipeline driven by [`FrameOptions`].

pub mod operators;

use std::fmt;

use crate::frame::Frame;
use crate::options::FrameOptions;

pub use operators::flip;

/// One filter of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    GrayscaleHistogramEqualization,
    ColorHistogramEqualization,
    BinaryThreshold,
    AdaptiveThreshold,
    ZeroThreshold,
    Sobel,
    TruncateThreshold,
    TriangleThreshold,
    BinomialBlur,
    Canny,
}

/// Order in which enabled filters run. Several filters change the colour
/// model, so reordering changes the output.
pub const ALGORITHM_ORDER: [Algorithm; 10] = [
    Algorithm::GrayscaleHistogramEqualization,
    Algorithm::ColorHistogramEqualization,
    Algorithm::BinaryThreshold,
    Algorithm::AdaptiveThreshold,
    Algorithm::ZeroThreshold,
    Algorithm::Sobel,
    Algorithm::TruncateThreshold,
    Algorithm::TriangleThreshold,
    Algorithm::BinomialBlur,
    Algorithm::Canny,
];

impl Algorithm {
    pub fn is_enabled(&self, options: &FrameOptions) -> bool {
        match self {
            Algorithm::GrayscaleHistogramEqualization => options.grayscale_histogram_equalization,
            Algorithm::ColorHistogramEqualization => options.color_histogram_equalization,
            Algorithm::BinaryThreshold => options.binary_threshold > 0,
            Algorithm::AdaptiveThreshold => options.adaptive_threshold > 0,
            Algorithm::ZeroThreshold => options.zero_threshold > 0,
            Algorithm::Sobel => options.sobel,
            Algorithm::TruncateThreshold => options.trunc_threshold > 0,
            Algorithm::TriangleThreshold => options.triangle_thresholding,
            Algorithm::BinomialBlur => options.binomial > 0,
            Algorithm::Canny => options.canny > 0,
        }
    }

    /// Run this filter with the parameters stored in `options`.
    pub fn apply(&self, frame: &Frame, options: &FrameOptions) -> Frame {
        match self {
            Algorithm::GrayscaleHistogramEqualization => {
                operators::grayscale_histogram_equalization(frame)
            }
            Algorithm::ColorHistogramEqualization => operators::color_histogram_equalization(frame),
            Algorithm::BinaryThreshold => operators::binary_threshold(frame, options.binary_threshold),
            Algorithm::AdaptiveThreshold => {
                operators::adaptive_threshold(frame, options.adaptive_threshold)
            }
            Algorithm::ZeroThreshold => operators::zero_threshold(frame, options.zero_threshold),
            Algorithm::Sobel => operators::sobel(frame),
            Algorithm::TruncateThreshold => {
                operators::truncate_threshold(frame, options.trunc_threshold)
            }
            Algorithm::TriangleThreshold => operators::triangle_threshold(frame),
            Algorithm::BinomialBlur => operators::binomial_blur(frame, options.binomial),
            Algorithm::Canny => {
                operators::canny(frame, options.canny, options.canny.saturating_mul(3))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::GrayscaleHistogramEqualization => "grayscale-histogram-equalization",
            Algorithm::ColorHistogramEqualization => "color-histogram-equalization",
            Algorithm::BinaryThreshold => "binary-threshold",
            Algorithm::AdaptiveThreshold => "adaptive-threshold",
            Algorithm::ZeroThreshold => "zero-threshold",
            Algorithm::Sobel => "sobel",
            Algorithm::TruncateThreshold => "truncate-threshold",
            Algorithm::TriangleThreshold => "triangle-threshold",
            Algorithm::BinomialBlur => "binomial-blur",
            Algorithm::Canny => "canny",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enabled filters, in pipeline order.
pub fn enabled_algorithms(options: &FrameOptions) -> Vec<Algorithm> {
    ALGORITHM_ORDER
        .into_iter()
        .filter(|a| a.is_enabled(options))
        .collect()
}

/// Run every enabled filter over `frame`. Flips are not applied here.
pub fn apply_algorithms(frame: &Frame, options: &FrameOptions) -> Frame {
    enabled_algorithms(options)
        .into_iter()
        .fold(frame.clone(), |current, algorithm| {
            algorithm.apply(&current, options)
        })
}
