use std::fmt;
use std::path::Path;

use crate::detect::collection::DetectionCollection;
use crate::detect::error::DetectorError;
use crate::frame::Frame;

/// Concrete detector family, as written in the `type` field of a config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    Cascade,
    CascadeGroup,
    Network,
    Onnx,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Cascade => "CASCADE",
            DetectorKind::CascadeGroup => "CASCADE_NETWORK",
            DetectorKind::Network | DetectorKind::Onnx => "NETWORK",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common detector contract.
///
/// Optional capabilities are discovered through the `as_*` queries, which
/// return `None` unless the concrete detector implements that capability.
///
/// `detect` must treat the frame as read-only. An empty result is a normal
/// outcome; errors are reserved for frames the detector cannot process and for
/// inference failures.
pub trait Detector: Send {
    /// Human-readable identifier (object label or model name).
    fn name(&self) -> &str;

    fn kind(&self) -> DetectorKind;

    fn detect(&mut self, frame: &Frame) -> Result<DetectionCollection, DetectorError>;

    /// File this detector was loaded from, if any. Mutable state is written
    /// back here when the detector is released.
    fn source_path(&self) -> Option<&Path> {
        None
    }

    fn as_threshold_adjuster(&self) -> Option<&dyn ThresholdAdjuster> {
        None
    }

    fn as_threshold_adjuster_mut(&mut self) -> Option<&mut dyn ThresholdAdjuster> {
        None
    }

    fn as_object_toggler(&self) -> Option<&dyn ObjectToggler> {
        None
    }

    fn as_object_toggler_mut(&mut self) -> Option<&mut dyn ObjectToggler> {
        None
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        None
    }
}

/// Adjustable confidence threshold.
pub trait ThresholdAdjuster {
    /// Values outside `0.0..=1.0` are ignored.
    fn adjust_threshold(&mut self, threshold: f32);

    fn threshold(&self) -> f32;
}

/// Per-label enable/disable.
pub trait ObjectToggler {
    /// Unknown labels are ignored.
    fn enable_object(&mut self, label: &str, enabled: bool);

    fn is_object_enabled(&self, label: &str) -> bool;

    /// Every label this detector can emit, in model order.
    fn object_labels(&self) -> Vec<String>;
}

/// Persist and restore a detector's reconstruction state.
pub trait Serializable {
    fn serialize(&self, path: &Path) -> Result<(), DetectorError>;

    fn deserialize(path: &Path) -> Result<Self, DetectorError>
    where
        Self: Sized;
}
