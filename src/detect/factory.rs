use std::path::Path;

use crate::detect::cascade::CascadeClassifierDetector;
use crate::detect::config::DetectorConfig;
use crate::detect::detector::{Detector, Serializable};
use crate::detect::error::DetectorError;
use crate::detect::group::CascadeClassifierGroup;
use crate::detect::network::NeuralNetworkDetector;
use crate::detect::onnx::OnnxDetector;

/// Builds detectors from their YAML description.
pub struct DetectorFactory;

impl DetectorFactory {
    /// Load the detector described by `path`.
    ///
    /// Failures are logged and reported as `None`.
    pub fn create_detector_from_file(path: &Path) -> Option<Box<dyn Detector>> {
        match Self::try_create_detector_from_file(path) {
            Ok(detector) => {
                log::info!(
                    "created {} detector {} from {}",
                    detector.kind(),
                    detector.name(),
                    path.display()
                );
                Some(detector)
            }
            Err(err) => {
                log::warn!("cannot create detector from {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Same as [`Self::create_detector_from_file`] but keeps the error.
    pub fn try_create_detector_from_file(
        path: &Path,
    ) -> Result<Box<dyn Detector>, DetectorError> {
        let detector: Box<dyn Detector> = match DetectorConfig::read(path)? {
            DetectorConfig::Cascade(_) => {
                Box::new(CascadeClassifierDetector::deserialize(path)?)
            }
            DetectorConfig::CascadeGroup(_) => {
                Box::new(CascadeClassifierGroup::deserialize(path)?)
            }
            DetectorConfig::Network(cfg) if cfg.is_onnx() => {
                Box::new(OnnxDetector::deserialize(path)?)
            }
            DetectorConfig::Network(_) => Box::new(NeuralNetworkDetector::deserialize(path)?),
        };
        Ok(detector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detector::DetectorKind;
    use crate::detect::haar::tests::BRIGHT_SQUARE_CASCADE;

    #[test]
    fn unknown_type_and_missing_file_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("svm.yaml");
        std::fs::write(&bad, "type: SVM\nmodel: svm.bin\n").unwrap();
        assert!(DetectorFactory::create_detector_from_file(&bad).is_none());
        let missing = dir.path().join("none.yaml");
        assert!(DetectorFactory::create_detector_from_file(&missing).is_none());
    }

    #[test]
    fn cascade_paths_resolve_next_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("square.xml"), BRIGHT_SQUARE_CASCADE).unwrap();
        let file = dir.path().join("square.yaml");
        std::fs::write(
            &file,
            "type: CASCADE\nobjectLabel: square\ncascadeFilePath: square.xml\n",
        )
        .unwrap();

        let det = DetectorFactory::create_detector_from_file(&file).unwrap();
        assert_eq!(det.kind(), DetectorKind::Cascade);
        assert_eq!(det.name(), "square");
        assert_eq!(det.source_path(), Some(file.as_path()));
    }

    #[test]
    fn network_with_missing_model_is_model_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("labels.txt"), "person\n").unwrap();
        let file = dir.path().join("yolo.yaml");
        std::fs::write(
            &file,
            "type: NETWORK\nmodelFilePath: yolo.onnx\nlabelsFilePath: labels.txt\n",
        )
        .unwrap();

        let err = DetectorFactory::try_create_detector_from_file(&file)
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelLoad { .. }));
    }
}
