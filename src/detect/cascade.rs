use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::detect::collection::DetectionCollection;
use crate::detect::config::{resolve_path, CascadeConfig, DetectorConfig};
use crate::detect::detection::{Detection, Rect};
use crate::detect::detector::{Detector, DetectorKind, Serializable};
use crate::detect::error::DetectorError;
use crate::detect::haar::{HaarCascade, RegionClassifier, ScanParams};
use crate::frame::Frame;

/// Single cascade bound to one object label.
///
/// Cascades carry no score, so every detection has confidence `0.0`.
pub struct CascadeClassifierDetector {
    label: String,
    /// Path as written in the detector file.
    cascade_path: PathBuf,
    classifier: Box<dyn RegionClassifier>,
    source: Option<PathBuf>,
}

impl CascadeClassifierDetector {
    /// Load the cascade at `cascade_path`.
    pub fn new(
        cascade_path: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Result<Self, DetectorError> {
        let cascade_path = cascade_path.into();
        let cascade = HaarCascade::from_file(&cascade_path)?;
        Ok(Self::with_classifier(label, cascade_path, Box::new(cascade)))
    }

    /// Wrap an already loaded classifier.
    pub fn with_classifier(
        label: impl Into<String>,
        cascade_path: impl Into<PathBuf>,
        classifier: Box<dyn RegionClassifier>,
    ) -> Self {
        Self {
            label: label.into(),
            cascade_path: cascade_path.into(),
            classifier,
            source: None,
        }
    }

    pub(crate) fn from_config(
        cfg: &CascadeConfig,
        base_dir: Option<&Path>,
    ) -> Result<Self, DetectorError> {
        let resolved = resolve_path(base_dir, &cfg.cascade_file_path);
        let cascade = HaarCascade::from_file(&resolved)?;
        Ok(Self::with_classifier(
            cfg.object_label.clone(),
            cfg.cascade_file_path.clone(),
            Box::new(cascade),
        ))
    }

    pub(crate) fn to_config(&self) -> CascadeConfig {
        CascadeConfig {
            object_label: self.label.clone(),
            cascade_file_path: self.cascade_path.clone(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cascade_path(&self) -> &Path {
        &self.cascade_path
    }

    /// Raw regions found in `gray`, in `gray`'s coordinates.
    pub fn regions(&self, gray: &GrayImage, params: &ScanParams) -> Vec<Rect> {
        self.classifier.detect_multi_scale(gray, params)
    }

    /// Whole-frame regions, with specks of 10 px or less dropped.
    pub(crate) fn frame_regions(&self, gray: &GrayImage) -> Vec<Rect> {
        self.regions(gray, &ScanParams::standalone())
            .into_iter()
            .filter(|r| r.width > 10 || r.height > 10)
            .collect()
    }
}

impl Detector for CascadeClassifierDetector {
    fn name(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::Cascade
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionCollection, DetectorError> {
        let gray = frame.to_gray();
        Ok(self
            .frame_regions(&gray)
            .into_iter()
            .map(|rect| Detection::new(rect, self.label.clone(), 0.0))
            .collect())
    }

    fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn as_serializable(&self) -> Option<&dyn Serializable> {
        Some(self)
    }
}

impl Serializable for CascadeClassifierDetector {
    fn serialize(&self, path: &Path) -> Result<(), DetectorError> {
        DetectorConfig::Cascade(self.to_config()).write(path)
    }

    fn deserialize(path: &Path) -> Result<Self, DetectorError> {
        match DetectorConfig::read(path)? {
            DetectorConfig::Cascade(cfg) => {
                let mut detector = Self::from_config(&cfg, path.parent())?;
                detector.source = Some(path.to_path_buf());
                Ok(detector)
            }
            other => Err(DetectorError::format(
                path,
                format!("expected type CASCADE, found {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::haar::tests::{square_image, BRIGHT_SQUARE_CASCADE};

    struct Fixed(Vec<Rect>);

    impl RegionClassifier for Fixed {
        fn detect_multi_scale(&self, _image: &GrayImage, _params: &ScanParams) -> Vec<Rect> {
            self.0.clone()
        }
    }

    #[test]
    fn drops_tiny_regions_and_sets_zero_confidence() {
        let mut det = CascadeClassifierDetector::with_classifier(
            "face",
            "face.xml",
            Box::new(Fixed(vec![
                Rect::new(0, 0, 8, 8),
                Rect::new(5, 5, 60, 60),
                Rect::new(1, 1, 11, 4),
            ])),
        );
        let found = det.detect(&Frame::Gray(GrayImage::new(100, 100))).unwrap();
        let rects: Vec<Rect> = found.iter().map(|d| d.rect).collect();
        assert_eq!(rects, vec![Rect::new(5, 5, 60, 60), Rect::new(1, 1, 11, 4)]);
        assert!(found.iter().all(|d| d.label == "face" && d.confidence == 0.0));
    }

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let cascade = dir.path().join("square.xml");
        std::fs::write(&cascade, BRIGHT_SQUARE_CASCADE).unwrap();

        let det = CascadeClassifierDetector::new(&cascade, "square").unwrap();
        let file = dir.path().join("square.yaml");
        det.serialize(&file).unwrap();

        let loaded = CascadeClassifierDetector::deserialize(&file).unwrap();
        assert_eq!(loaded.label(), "square");
        assert_eq!(loaded.cascade_path(), cascade.as_path());
        assert_eq!(loaded.source_path(), Some(file.as_path()));
    }

    #[test]
    fn detects_square_on_colour_frame() {
        let dir = tempfile::tempdir().unwrap();
        let cascade = dir.path().join("square.xml");
        std::fs::write(&cascade, BRIGHT_SQUARE_CASCADE).unwrap();
        let mut det = CascadeClassifierDetector::new(&cascade, "square").unwrap();

        let gray = square_image(200, Rect::new(70, 70, 60, 60));
        let frame = Frame::Rgb(image::DynamicImage::ImageLuma8(gray).to_rgb8());
        let found = det.detect(&frame).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get(0).map(|d| d.label.as_str()), Some("square"));
    }

    #[test]
    fn missing_cascade_is_a_model_load_error() {
        let err = CascadeClassifierDetector::new("/nonexistent/cascade.xml", "face")
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelLoad { .. }));
    }
}
