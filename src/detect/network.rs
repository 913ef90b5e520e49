//! Neural-network detectors.
//!
//! [`NeuralNetworkDetector`] decodes SSD-style rows of seven values,
//! `[batch, class_id, confidence, x1, y1, x2, y2]`, with 1-based class ids
//! and coordinates normalised to the frame. [`crate::detect::onnx`] reuses the
//! shared state defined here for YOLO-style exports.

use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage};
use imageproc::contrast::equalize_histogram;

use crate::detect::backend::{
    load_backend, BackendOptions, InferenceBackend, InputBlob, OutputTensor,
};
use crate::detect::collection::DetectionCollection;
use crate::detect::config::{resolve_path, DetectorConfig, NetworkConfig};
use crate::detect::detection::{Detection, Rect};
use crate::detect::detector::{
    Detector, DetectorKind, ObjectToggler, Serializable, ThresholdAdjuster,
};
use crate::detect::error::DetectorError;
use crate::frame::Frame;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Read a labels file: one class per line, trailing blank lines ignored.
pub fn read_labels(path: &Path) -> Result<Vec<String>, DetectorError> {
    let raw = std::fs::read_to_string(path).map_err(|e| DetectorError::io(path, e))?;
    let mut labels: Vec<String> = raw
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    while labels.last().is_some_and(|l| l.trim().is_empty()) {
        labels.pop();
    }
    if labels.is_empty() {
        return Err(DetectorError::format(path, "labels file lists no classes"));
    }
    Ok(labels)
}

/// State shared by both network detector flavours.
pub(crate) struct NetworkCore {
    name: String,
    backend: Box<dyn InferenceBackend>,
    labels: Vec<String>,
    enabled: Vec<bool>,
    threshold: f32,
    config: NetworkConfig,
    source: Option<PathBuf>,
}

impl NetworkCore {
    pub(crate) fn with_backend(
        backend: Box<dyn InferenceBackend>,
        labels: Vec<String>,
        config: NetworkConfig,
    ) -> Self {
        let name = config
            .model_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "network".to_string());
        let mut core = Self {
            name,
            backend,
            enabled: vec![true; labels.len()],
            labels,
            threshold: DEFAULT_THRESHOLD,
            config,
            source: None,
        };
        for label in core.config.disabled_class_names.clone() {
            core.enable_object(&label, false);
        }
        core
    }

    /// Read labels and load the model named by `config`. Relative paths are
    /// resolved against `base_dir`.
    pub(crate) fn load(
        config: NetworkConfig,
        base_dir: Option<&Path>,
        default_input: (u32, u32),
    ) -> Result<Self, DetectorError> {
        let labels = read_labels(&resolve_path(base_dir, &config.labels_file_path))?;
        let model = resolve_path(base_dir, &config.model_file_path);
        let cfg_file = config
            .config_file_path
            .as_deref()
            .map(|p| resolve_path(base_dir, p));
        let options = BackendOptions {
            input_size: (
                config.input_width.unwrap_or(default_input.0),
                config.input_height.unwrap_or(default_input.1),
            ),
            output_layer: config.output_layer.clone(),
        };
        let backend = load_backend(&model, cfg_file.as_deref(), &options)?;
        log::info!(
            "network {} ready: {} classes, backend {}",
            model.display(),
            labels.len(),
            backend.name()
        );
        Ok(Self::with_backend(backend, labels, config))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn labels(&self) -> &[String] {
        &self.labels
    }

    pub(crate) fn threshold(&self) -> f32 {
        self.threshold
    }

    pub(crate) fn input_size(&self) -> (u32, u32) {
        self.backend.input_size()
    }

    pub(crate) fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn set_source(&mut self, path: &Path) {
        self.source = Some(path.to_path_buf());
    }

    pub(crate) fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Label at `index` plus its enabled flag.
    pub(crate) fn class(&self, index: usize) -> Option<(&str, bool)> {
        self.labels
            .get(index)
            .map(|label| (label.as_str(), self.enabled[index]))
    }

    /// Colour input for the model; gray frames are rejected.
    pub(crate) fn color_input(&self, frame: &Frame) -> Result<RgbImage, DetectorError> {
        if frame.channels() < 3 {
            return Err(DetectorError::IncompatibleFrame {
                detector: self.name.clone(),
                expected: 3,
                found: frame.channels(),
            });
        }
        Ok(frame.to_rgb())
    }

    /// Model input for both network kinds: the colour frame is reduced to
    /// gray, histogram-equalized and spread back over three channels.
    pub(crate) fn equalized_input(&self, frame: &Frame) -> Result<RgbImage, DetectorError> {
        let rgb = self.color_input(frame)?;
        let equalized = equalize_histogram(&DynamicImage::ImageRgb8(rgb).into_luma8());
        Ok(DynamicImage::ImageLuma8(equalized).into_rgb8())
    }

    pub(crate) fn forward(&mut self, blob: &InputBlob) -> Result<OutputTensor, DetectorError> {
        self.backend
            .forward(blob)
            .map_err(|e| DetectorError::Inference(format!("{e:#}")))
    }

    pub(crate) fn adjust_threshold(&mut self, threshold: f32) {
        if (0.0..=1.0).contains(&threshold) {
            self.threshold = threshold;
        }
    }

    pub(crate) fn enable_object(&mut self, label: &str, enabled: bool) {
        for (known, flag) in self.labels.iter().zip(self.enabled.iter_mut()) {
            if known == label {
                *flag = enabled;
            }
        }
    }

    pub(crate) fn is_object_enabled(&self, label: &str) -> bool {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.enabled[i])
            .unwrap_or(false)
    }

    pub(crate) fn to_config(&self) -> NetworkConfig {
        let mut disabled: Vec<String> = Vec::new();
        for (label, enabled) in self.labels.iter().zip(&self.enabled) {
            if !enabled && !disabled.contains(label) {
                disabled.push(label.clone());
            }
        }
        NetworkConfig {
            disabled_class_names: disabled,
            ..self.config.clone()
        }
    }

    pub(crate) fn write(&self, path: &Path) -> Result<(), DetectorError> {
        DetectorConfig::Network(self.to_config()).write(path)
    }
}

/// Read a `NETWORK` detector file.
pub(crate) fn read_network_config(path: &Path) -> Result<NetworkConfig, DetectorError> {
    match DetectorConfig::read(path)? {
        DetectorConfig::Network(cfg) => Ok(cfg),
        other => Err(DetectorError::format(
            path,
            format!("expected type NETWORK, found {}", other.type_name()),
        )),
    }
}

/// SSD-style detector.
pub struct NeuralNetworkDetector {
    core: NetworkCore,
}

impl NeuralNetworkDetector {
    pub const DEFAULT_INPUT: (u32, u32) = (300, 300);

    pub fn new(
        model_file_path: impl Into<PathBuf>,
        config_file_path: Option<PathBuf>,
        labels_file_path: impl Into<PathBuf>,
    ) -> Result<Self, DetectorError> {
        let config = NetworkConfig {
            model_file_path: model_file_path.into(),
            config_file_path,
            labels_file_path: labels_file_path.into(),
            disabled_class_names: Vec::new(),
            output_layer: None,
            input_width: None,
            input_height: None,
        };
        Self::from_config(config, None)
    }

    /// Wrap an already loaded backend.
    pub fn with_backend(
        backend: Box<dyn InferenceBackend>,
        labels: Vec<String>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            core: NetworkCore::with_backend(backend, labels, config),
        }
    }

    pub(crate) fn from_config(
        config: NetworkConfig,
        base_dir: Option<&Path>,
    ) -> Result<Self, DetectorError> {
        Ok(Self {
            core: NetworkCore::load(config, base_dir, Self::DEFAULT_INPUT)?,
        })
    }

    pub fn labels(&self) -> &[String] {
        self.core.labels()
    }

    pub fn model_path(&self) -> &Path {
        &self.core.config().model_file_path
    }

    fn decode(
        &self,
        output: &OutputTensor,
        width: u32,
        height: u32,
    ) -> Result<DetectionCollection, DetectorError> {
        let rows = output
            .rows(7)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let (cols, rows_px) = (width as f32, height as f32);
        let threshold = self.core.threshold();

        let mut out = DetectionCollection::new();
        for row in rows {
            let confidence = row[2];
            if !(confidence > threshold) {
                continue;
            }
            let class_id = row[1] as i64;
            let Some((label, enabled)) = usize::try_from(class_id - 1)
                .ok()
                .and_then(|index| self.core.class(index))
            else {
                continue;
            };

            let x = (row[3] * cols) as i32;
            let y = (row[4] * rows_px) as i32;
            let w = (row[5] * cols - x as f32) as i32;
            let h = (row[6] * rows_px - y as f32) as i32;
            let rect = Rect::new(x, y, w.max(0) as u32, h.max(0) as u32);
            out.push(Detection::new(rect, label, confidence).with_render_enabled(enabled));
        }
        Ok(out)
    }
}

impl Detector for NeuralNetworkDetector {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Network
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionCollection, DetectorError> {
        let prepared = self.core.equalized_input(frame)?;
        let (iw, ih) = self.core.input_size();
        let blob = InputBlob::from_rgb(&prepared, iw, ih, 1.0);
        let output = self.core.forward(&blob)?;
        self.decode(&output, frame.width(), frame.height())
    }

    fn source_path(&self) -> Option<&Path> {
        self.core.source_path()
    }

    fn as_threshold_adjuster(&self) -> Option<&dyn ThresholdAdjuster> {
        Some(self)
    }

    fn as_threshold_adjuster_mut(&mut self) -> Option<&mut dyn ThresholdAdjuster> {
        Some(self)
    }

    fn as_object_toggler(&self) -> Option<&dyn ObjectToggler> {
        Some(self)
    }

    fn as_object_toggler_mut(&mut self) -> Option<&mut dyn ObjectToggler> {
        Some(self)
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl ThresholdAdjuster for NeuralNetworkDetector {
    fn adjust_threshold(&mut self, threshold: f32) {
        self.core.adjust_threshold(threshold);
    }

    fn threshold(&self) -> f32 {
        self.core.threshold()
    }
}

impl ObjectToggler for NeuralNetworkDetector {
    fn enable_object(&mut self, label: &str, enabled: bool) {
        self.core.enable_object(label, enabled);
    }

    fn is_object_enabled(&self, label: &str) -> bool {
        self.core.is_object_enabled(label)
    }

    fn object_labels(&self) -> Vec<String> {
        self.core.labels().to_vec()
    }
}

impl Serializable for NeuralNetworkDetector {
    fn serialize(&self, path: &Path) -> Result<(), DetectorError> {
        self.core.write(path)
    }

    fn deserialize(path: &Path) -> Result<Self, DetectorError> {
        let config = read_network_config(path)?;
        let mut detector = Self::from_config(config, path.parent())?;
        detector.core.set_source(path);
        Ok(detector)
    }
}
