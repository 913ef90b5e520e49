use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every option a user can change and later revert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevertableOption {
    FlipHorizontal,
    FlipVertical,
    ShowFeatures,
    ShowConfidence,
    Threshold,
    Confidence,
    BinaryThresholding,
    ZeroThresholding,
    TruncThresholding,
    AdaptiveThresholding,
    GrayscaleHistogramEqualization,
    ColorHistogramEqualization,
    Sobel,
    TriangleThresholding,
    Binomial,
    Canny,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown option {0:?}")]
pub struct UnknownOption(pub String);

impl RevertableOption {
    pub const ALL: [RevertableOption; 16] = [
        RevertableOption::FlipHorizontal,
        RevertableOption::FlipVertical,
        RevertableOption::ShowFeatures,
        RevertableOption::ShowConfidence,
        RevertableOption::Threshold,
        RevertableOption::Confidence,
        RevertableOption::BinaryThresholding,
        RevertableOption::ZeroThresholding,
        RevertableOption::TruncThresholding,
        RevertableOption::AdaptiveThresholding,
        RevertableOption::GrayscaleHistogramEqualization,
        RevertableOption::ColorHistogramEqualization,
        RevertableOption::Sobel,
        RevertableOption::TriangleThresholding,
        RevertableOption::Binomial,
        RevertableOption::Canny,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RevertableOption::FlipHorizontal => "FLIP_HORIZONTAL",
            RevertableOption::FlipVertical => "FLIP_VERTICAL",
            RevertableOption::ShowFeatures => "SHOW_FEATURES",
            RevertableOption::ShowConfidence => "SHOW_CONFIDENCE",
            RevertableOption::Threshold => "THRESHOLD",
            RevertableOption::Confidence => "CONFIDENCE",
            RevertableOption::BinaryThresholding => "BINARY_THRESHOLDING",
            RevertableOption::ZeroThresholding => "ZERO_THRESHOLDING",
            RevertableOption::TruncThresholding => "TRUNC_THRESHOLDING",
            RevertableOption::AdaptiveThresholding => "ADAPTIVE_THRESHOLDING",
            RevertableOption::GrayscaleHistogramEqualization => {
                "GRAYSCALE_HISTOGRAM_EQUALIZATION"
            }
            RevertableOption::ColorHistogramEqualization => "COLOR_HISTOGRAM_EQUALIZATION",
            RevertableOption::Sobel => "SOBEL",
            RevertableOption::TriangleThresholding => "TRIANGLE_THRESHOLDING",
            RevertableOption::Binomial => "BINOMIAL",
            RevertableOption::Canny => "CANNY",
        }
    }

    /// Status-bar wording for a change of this option.
    pub fn phrase(&self) -> &'static str {
        match self {
            RevertableOption::FlipHorizontal => "horizontal flip",
            RevertableOption::FlipVertical => "vertical flip",
            RevertableOption::ShowFeatures => "show features",
            RevertableOption::ShowConfidence => "show confidence",
            RevertableOption::Threshold => "minimum threshold change",
            RevertableOption::Confidence => "minimum confidence change",
            RevertableOption::BinaryThresholding => "binary thresholding",
            RevertableOption::ZeroThresholding => "zero thresholding",
            RevertableOption::TruncThresholding => "Truncate Thresholding",
            RevertableOption::AdaptiveThresholding => "adaptive thresholding",
            RevertableOption::GrayscaleHistogramEqualization => {
                "grayscale histogram equalization"
            }
            RevertableOption::ColorHistogramEqualization => "histogram equalization",
            RevertableOption::Sobel => "sobel",
            RevertableOption::TriangleThresholding => "triangle thresholding",
            RevertableOption::Binomial => "binomial",
            RevertableOption::Canny => "canny",
        }
    }

    /// True for on/off options; the rest carry a numeric value.
    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            RevertableOption::FlipHorizontal
                | RevertableOption::FlipVertical
                | RevertableOption::ShowFeatures
                | RevertableOption::ShowConfidence
                | RevertableOption::GrayscaleHistogramEqualization
                | RevertableOption::ColorHistogramEqualization
                | RevertableOption::Sobel
                | RevertableOption::TriangleThresholding
        )
    }

    /// Parse a user-supplied value. Flags take `true`/`on`/`1` or
    /// `false`/`off`/`0`; numeric options any `i16`.
    pub fn parse_value(&self, raw: &str) -> Option<i16> {
        match raw.trim() {
            "true" | "on" => Some(1),
            "false" | "off" => Some(0),
            other => {
                let value = other.parse::<i16>().ok()?;
                if self.is_flag() && !matches!(value, 0 | 1) {
                    return None;
                }
                Some(value)
            }
        }
    }
}

impl fmt::Display for RevertableOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `BINARY_THRESHOLDING`, `binary_thresholding` and
/// `binary-thresholding`.
impl FromStr for RevertableOption {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase().replace('-', "_");
        RevertableOption::ALL
            .into_iter()
            .find(|o| o.as_str() == tag)
            .ok_or_else(|| UnknownOption(s.to_string()))
    }
}

/// Snapshot of every view and filter option.
///
/// Numeric filters are active when their value is positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameOptions {
    pub confidence: i16,
    pub threshold: i16,
    pub binary_threshold: i16,
    pub zero_threshold: i16,
    pub trunc_threshold: i16,
    pub adaptive_threshold: i16,
    pub binomial: i16,
    pub canny: i16,
    pub color_histogram_equalization: bool,
    pub grayscale_histogram_equalization: bool,
    pub sobel: bool,
    pub triangle_thresholding: bool,
    pub show_features: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub show_confidence: bool,
    pub last_changed: Option<RevertableOption>,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            confidence: 0,
            threshold: 0,
            binary_threshold: 0,
            zero_threshold: 0,
            trunc_threshold: 0,
            adaptive_threshold: 0,
            binomial: 0,
            canny: 0,
            color_histogram_equalization: false,
            grayscale_histogram_equalization: false,
            sobel: false,
            triangle_thresholding: false,
            show_features: false,
            // camera feeds are mirrored
            flip_horizontal: true,
            flip_vertical: false,
            show_confidence: false,
            last_changed: None,
        }
    }
}

impl FrameOptions {
    /// Write `value` into the field `option` controls. Flags are set when
    /// `value` is non-zero.
    pub fn set(&mut self, option: RevertableOption, value: i16) {
        let flag = value != 0;
        match option {
            RevertableOption::FlipHorizontal => self.flip_horizontal = flag,
            RevertableOption::FlipVertical => self.flip_vertical = flag,
            RevertableOption::ShowFeatures => self.show_features = flag,
            RevertableOption::ShowConfidence => self.show_confidence = flag,
            RevertableOption::Threshold => self.threshold = value,
            RevertableOption::Confidence => self.confidence = value,
            RevertableOption::BinaryThresholding => self.binary_threshold = value,
            RevertableOption::ZeroThresholding => self.zero_threshold = value,
            RevertableOption::TruncThresholding => self.trunc_threshold = value,
            RevertableOption::AdaptiveThresholding => self.adaptive_threshold = value,
            RevertableOption::GrayscaleHistogramEqualization => {
                self.grayscale_histogram_equalization = flag
            }
            RevertableOption::ColorHistogramEqualization => {
                self.color_histogram_equalization = flag
            }
            RevertableOption::Sobel => self.sobel = flag,
            RevertableOption::TriangleThresholding => self.triangle_thresholding = flag,
            RevertableOption::Binomial => self.binomial = value,
            RevertableOption::Canny => self.canny = value,
        }
    }

    /// Current value of `option`, flags reported as 0 or 1.
    pub fn get(&self, option: RevertableOption) -> i16 {
        match option {
            RevertableOption::FlipHorizontal => self.flip_horizontal as i16,
            RevertableOption::FlipVertical => self.flip_vertical as i16,
            RevertableOption::ShowFeatures => self.show_features as i16,
            RevertableOption::ShowConfidence => self.show_confidence as i16,
            RevertableOption::Threshold => self.threshold,
            RevertableOption::Confidence => self.confidence,
            RevertableOption::BinaryThresholding => self.binary_threshold,
            RevertableOption::ZeroThresholding => self.zero_threshold,
            RevertableOption::TruncThresholding => self.trunc_threshold,
            RevertableOption::AdaptiveThresholding => self.adaptive_threshold,
            RevertableOption::GrayscaleHistogramEqualization => {
                self.grayscale_histogram_equalization as i16
            }
            RevertableOption::ColorHistogramEqualization => {
                self.color_histogram_equalization as i16
            }
            RevertableOption::Sobel => self.sobel as i16,
            RevertableOption::TriangleThresholding => self.triangle_thresholding as i16,
            RevertableOption::Binomial => self.binomial,
            RevertableOption::Canny => self.canny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_in_several_spellings() {
        assert_eq!(
            "BINARY_THRESHOLDING".parse::<RevertableOption>(),
            Ok(RevertableOption::BinaryThresholding)
        );
        assert_eq!("canny".parse::<RevertableOption>(), Ok(RevertableOption::Canny));
        assert_eq!(
            " flip-horizontal ".parse::<RevertableOption>(),
            Ok(RevertableOption::FlipHorizontal)
        );
        assert_eq!(
            "EMBOSS".parse::<RevertableOption>(),
            Err(UnknownOption("EMBOSS".into()))
        );
    }

    #[test]
    fn every_tag_round_trips_through_its_name() {
        for option in RevertableOption::ALL {
            assert_eq!(option.as_str().parse::<RevertableOption>(), Ok(option));
        }
    }

    #[test]
    fn set_writes_exactly_one_field() {
        for option in RevertableOption::ALL {
            let mut opts = FrameOptions::default();
            let before = opts;
            let value = if option == RevertableOption::FlipHorizontal { 0 } else { 7 };
            opts.set(option, value);
            assert_ne!(opts, before, "{option} changed nothing");
            for other in RevertableOption::ALL.into_iter().filter(|o| *o != option) {
                assert_eq!(opts.get(other), before.get(other), "{option} touched {other}");
            }
        }
    }

    #[test]
    fn flags_only_take_boolean_values() {
        assert!(RevertableOption::Sobel.is_flag());
        assert!(!RevertableOption::Canny.is_flag());
        assert_eq!(RevertableOption::Sobel.parse_value("on"), Some(1));
        assert_eq!(RevertableOption::Sobel.parse_value(" 0 "), Some(0));
        assert_eq!(RevertableOption::Sobel.parse_value("120"), None);
        assert_eq!(RevertableOption::Canny.parse_value("120"), Some(120));
        assert_eq!(RevertableOption::Canny.parse_value("off"), Some(0));
        assert_eq!(RevertableOption::Canny.parse_value("lots"), None);
    }

    #[test]
    fn defaults_mirror_the_camera() {
        let opts = FrameOptions::default();
        assert!(opts.flip_horizontal);
        assert!(!opts.flip_vertical);
        assert_eq!(opts.last_changed, None);
    }
}
