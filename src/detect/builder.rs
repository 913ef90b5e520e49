//! Assemble new detectors from model files and store them in a detector
//! directory.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::detect::cascade::CascadeClassifierDetector;
use crate::detect::detection::ShapeKind;
use crate::detect::detector::{Detector, Serializable};
use crate::detect::group::{CascadeClassifierGroup, CascadeSlot};
use crate::detect::network::NeuralNetworkDetector;
use crate::detect::onnx::OnnxDetector;

/// One cascade chosen for a new detector.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeEntry {
    pub label: String,
    pub cascade_file_path: PathBuf,
    pub shape: ShapeKind,
}

impl CascadeEntry {
    pub fn new(label: impl Into<String>, cascade_file_path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            cascade_file_path: cascade_file_path.into(),
            shape: ShapeKind::Rectangle,
        }
    }

    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }
}

/// A single entry becomes a plain cascade detector. Several entries become a
/// group whose primary is `primary`, or the first entry when unset.
pub fn build_cascade_detector(
    entries: &[CascadeEntry],
    primary: Option<&str>,
) -> Result<Box<dyn Detector>> {
    let load = |entry: &CascadeEntry| -> Result<CascadeClassifierDetector> {
        if entry.label.trim().is_empty() {
            bail!("cascade {} has no label", entry.cascade_file_path.display());
        }
        CascadeClassifierDetector::new(&entry.cascade_file_path, entry.label.clone())
            .with_context(|| format!("failed to load cascade for {}", entry.label))
    };

    match entries {
        [] => Err(anyhow!("at least one cascade is required")),
        [single] => Ok(Box::new(load(single)?)),
        [first, rest @ ..] => {
            let mut group = CascadeClassifierGroup::new(
                CascadeSlot::new(load(first)?).with_shape(first.shape),
            );
            for entry in rest {
                group.add(CascadeSlot::new(load(entry)?).with_shape(entry.shape));
            }
            if let Some(label) = primary {
                group.set_primary(label);
            }
            Ok(Box::new(group))
        }
    }
}

/// ONNX exports get the YOLO decoder, everything else the SSD decoder.
pub fn build_network_detector(
    model: &Path,
    config: Option<&Path>,
    labels: &Path,
) -> Result<Box<dyn Detector>> {
    let is_onnx = model
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("onnx"));
    let config = config.map(Path::to_path_buf);
    let detector: Box<dyn Detector> = if is_onnx {
        Box::new(OnnxDetector::new(model, config, labels)?)
    } else {
        Box::new(NeuralNetworkDetector::new(model, config, labels)?)
    };
    Ok(detector)
}

/// Write `detector` to `<dir>/<name>.yaml` and return the path.
pub fn save_detector(detector: &dyn Detector, dir: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        bail!("detector name must not be empty");
    }
    if name.contains(['/', '\\']) {
        bail!("detector name {name:?} must not contain path separators");
    }
    let serializable = detector
        .as_serializable()
        .ok_or_else(|| anyhow!("{} detectors cannot be saved", detector.kind()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{name}.{}", crate::detect::catalog::DETECTOR_EXTENSION));
    serializable.serialize(&path)?;
    log::info!("saved {} detector to {}", detector.kind(), path.display());
    Ok(path)
}
