use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::detect::detector::Detector;
use crate::detect::factory::DetectorFactory;

pub const DETECTOR_EXTENSION: &str = "yaml";

/// Detector files found in one directory, keyed by file stem.
///
/// A file is listed only when the factory can build a detector from it; the
/// trial detector is dropped again and [`DetectorCatalog::load`] builds a
/// fresh one.
#[derive(Clone, Debug, Default)]
pub struct DetectorCatalog {
    dir: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl DetectorCatalog {
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let read = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list detectors in {}", dir.display()))?;

        let mut entries = BTreeMap::new();
        for entry in read {
            let path = entry
                .with_context(|| format!("failed to list detectors in {}", dir.display()))?
                .path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(DETECTOR_EXTENSION));
            if !is_yaml || !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            match DetectorFactory::try_create_detector_from_file(&path) {
                Ok(detector) => {
                    log::debug!("catalog: {} ({})", name, detector.kind());
                    entries.insert(name, path);
                }
                Err(err) => log::debug!("catalog: skipping {}: {}", path.display(), err),
            }
        }

        log::info!("found {} detector(s) in {}", entries.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Detector names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Where a detector called `name` is stored in this catalog's directory.
    pub fn path_for_new(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{DETECTOR_EXTENSION}"))
    }

    pub fn load(&self, name: &str) -> Option<Box<dyn Detector>> {
        let path = self.path(name)?;
        DetectorFactory::create_detector_from_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::haar::tests::BRIGHT_SQUARE_CASCADE;

    #[test]
    fn lists_loadable_yaml_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("face.xml"), BRIGHT_SQUARE_CASCADE).unwrap();
        std::fs::write(
            dir.path().join("face.yaml"),
            "type: CASCADE\nobjectLabel: face\ncascadeFilePath: face.xml\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Eyes.YAML"),
            "type: CASCADE\nobjectLabel: eyes\ncascadeFilePath: face.xml\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "type: CASCADE\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a detector").unwrap();

        let catalog = DetectorCatalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.names(), vec!["Eyes", "face"]);
        assert_eq!(catalog.path("face"), Some(dir.path().join("face.yaml").as_path()));
        assert!(catalog.path("broken").is_none());
        assert_eq!(catalog.path_for_new("eyes"), dir.path().join("eyes.yaml"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(DetectorCatalog::scan("/nonexistent/detectors").is_err());
    }

    #[test]
    fn unloadable_entries_are_not_listed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("face.yaml"),
            "type: CASCADE\nobjectLabel: face\ncascadeFilePath: missing.xml\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("coco.yaml"),
            "type: NETWORK\nmodelFilePath: coco.onnx\nlabelsFilePath: coco.names\n",
        )
        .unwrap();
        let catalog = DetectorCatalog::scan(dir.path()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.load("face").is_none());
        assert!(catalog.load("nope").is_none());
    }
}
