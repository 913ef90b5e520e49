use std::path::{Path, PathBuf};

use crate::detect::backend::{InferenceBackend, InputBlob, OutputTensor};
use crate::detect::collection::DetectionCollection;
use crate::detect::config::NetworkConfig;
use crate::detect::detection::{Detection, Rect};
use crate::detect::detector::{
    Detector, DetectorKind, ObjectToggler, Serializable, ThresholdAdjuster,
};
use crate::detect::error::DetectorError;
use crate::detect::network::{read_network_config, NetworkCore};
use crate::detect::nms::{non_max_suppression, NMS_IOU_THRESHOLD};
use crate::frame::Frame;

/// YOLO-style ONNX detector.
///
/// Output rows are `[cx, cy, w, h, objectness, class scores...]` in model
/// input pixels. A row survives when its objectness beats the threshold; its
/// class is the best-scoring one, and the reported confidence is the
/// objectness. Overlapping boxes are then thinned with greedy NMS.
pub struct OnnxDetector {
    core: NetworkCore,
}

impl OnnxDetector {
    pub const DEFAULT_INPUT: (u32, u32) = (224, 224);
    pub const INPUT_SCALE: f32 = 1.0 / 255.0;

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

    fn decode(
        &self,
        output: &OutputTensor,
        frame_size: (u32, u32),
    ) -> Result<DetectionCollection, DetectorError> {
        let rows = output
            .rows(6)
            .map_err(|e| DetectorError::Inference(e.to_string()))?;
        let (iw, ih) = self.core.input_size();
        let sx = frame_size.0 as f32 / iw as f32;
        let sy = frame_size.1 as f32 / ih as f32;
        let threshold = self.core.threshold();

        let mut boxes = Vec::new();
        let mut scores = Vec::new();
        let mut classes = Vec::new();
        for row in rows {
            let objectness = row[4];
            if !(objectness > threshold) {
                continue;
            }
            let Some(class) = argmax(&row[5..]) else {
                continue;
            };
            if self.core.class(class).is_none() {
                continue;
            }

            let width = (row[2] * sx) as i32;
            let height = (row[3] * sy) as i32;
            let x = (row[0] * sx - 0.5 * width as f32) as i32;
            let y = (row[1] * sy - 0.5 * height as f32) as i32;
            boxes.push(Rect::new(x, y, width.max(0) as u32, height.max(0) as u32));
            scores.push(objectness);
            classes.push(class);
        }

        let mut out = DetectionCollection::new();
        for index in non_max_suppression(&boxes, &scores, NMS_IOU_THRESHOLD) {
            if let Some((label, enabled)) = self.core.class(classes[index]) {
                out.push(
                    Detection::new(boxes[index], label, scores[index])
                        .with_render_enabled(enabled),
                );
            }
        }
        Ok(out)
    }
}

/// Index of the highest score; the first one wins ties.
fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if top >= score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

impl Detector for OnnxDetector {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Onnx
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionCollection, DetectorError> {
        let prepared = self.core.equalized_input(frame)?;
        let (iw, ih) = self.core.input_size();
        let blob = InputBlob::from_rgb(&prepared, iw, ih, Self::INPUT_SCALE);
        let output = self.core.forward(&blob)?;
        self.decode(&output, frame.dimensions())
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

impl ThresholdAdjuster for OnnxDetector {
    fn adjust_threshold(&mut self, threshold: f32) {
        self.core.adjust_threshold(threshold);
    }

    fn threshold(&self) -> f32 {
        self.core.threshold()
    }
}

impl ObjectToggler for OnnxDetector {
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

impl Serializable for OnnxDetector {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use image::{Rgb, RgbImage};

    type Seen = std::sync::Arc<std::sync::Mutex<Vec<[usize; 4]>>>;

    fn detector(rows: &[&[f32]]) -> (OnnxDetector, Seen) {
        let backend =
            StubBackend::new(OnnxDetector::DEFAULT_INPUT, OutputTensor::from_rows(rows));
        let seen = backend.seen_inputs();
        let det = OnnxDetector::with_backend(
            Box::new(backend),
            vec!["dog".into(), "ball".into()],
            NetworkConfig {
                model_file_path: PathBuf::from("yolo.onnx"),
                config_file_path: None,
                labels_file_path: PathBuf::from("coco.names"),
                disabled_class_names: Vec::new(),
                output_layer: None,
                input_width: None,
                input_height: None,
            },
        );
        (det, seen)
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn scales_boxes_and_suppresses_overlaps() {
        let (mut det, seen) = detector(&[
            &[112.0, 112.0, 50.0, 40.0, 0.9, 0.1, 0.8],
            &[114.0, 112.0, 50.0, 40.0, 0.7, 0.2, 0.7],
            &[20.0, 20.0, 10.0, 10.0, 0.6, 0.9, 0.1],
            &[200.0, 200.0, 10.0, 10.0, 0.3, 0.9, 0.1],
        ]);
        let frame = Frame::Rgb(RgbImage::from_pixel(448, 224, Rgb([10, 20, 30])));
        let found = det.detect(&frame).unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[[1, 3, 224, 224]]);
        assert_eq!(found.len(), 2);
        let ball = found.get(0).unwrap();
        assert_eq!(ball.label, "ball");
        assert_eq!(ball.rect, Rect::new(174, 92, 100, 40));
        assert!((ball.confidence - 0.9).abs() < 1e-6);
        let dog = found.get(1).unwrap();
        assert_eq!(dog.label, "dog");
        assert_eq!(dog.rect, Rect::new(30, 15, 20, 10));
    }

    #[test]
    fn disabled_class_is_kept_but_not_rendered() {
        let (mut det, _) = detector(&[&[50.0, 50.0, 20.0, 20.0, 0.95, 0.9, 0.1]]);
        det.enable_object("dog", false);
        let frame = Frame::Rgb(RgbImage::new(224, 224));
        let found = det.detect(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found.get(0).unwrap().render_enabled);
        assert!(!found.is_label_rendered("dog"));
    }

    #[test]
    fn gray_frame_is_incompatible() {
        let (mut det, seen) = detector(&[&[50.0, 50.0, 20.0, 20.0, 0.95, 0.9, 0.1]]);
        let gray = Frame::Gray(image::GrayImage::new(224, 224));
        let err = det.detect(&gray).unwrap_err();
        assert!(matches!(
            err,
            DetectorError::IncompatibleFrame {
                expected: 3,
                found: 1,
                ..
            }
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn raising_threshold_drops_rows() {
        let (mut det, _) = detector(&[&[50.0, 50.0, 20.0, 20.0, 0.6, 0.9, 0.1]]);
        det.adjust_threshold(0.7);
        let found = det.detect(&Frame::Rgb(RgbImage::new(224, 224))).unwrap();
        assert!(found.is_empty());
        assert_eq!(det.kind(), DetectorKind::Onnx);
    }
}
