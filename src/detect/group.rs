//! Primary cascade plus dependent cascades scoped to its regions.
//!
//! The group owns every cascade in one slot vector and marks the primary by
//! index. The primary scans the whole frame. Each enabled dependent scans only
//! the gray crop of every primary region, and its hits are shifted back into
//! frame coordinates.

use std::path::{Path, PathBuf};

use image::imageops;

use crate::detect::cascade::CascadeClassifierDetector;
use crate::detect::collection::DetectionCollection;
use crate::detect::config::{CascadeGroupConfig, ClassifierEntry, DetectorConfig};
use crate::detect::detection::{Detection, ShapeKind};
use crate::detect::detector::{Detector, DetectorKind, ObjectToggler, Serializable};
use crate::detect::error::DetectorError;
use crate::detect::haar::ScanParams;
use crate::frame::Frame;

pub struct CascadeSlot {
    pub detector: CascadeClassifierDetector,
    pub enabled: bool,
    pub shape: ShapeKind,
}

impl CascadeSlot {
    pub fn new(detector: CascadeClassifierDetector) -> Self {
        Self {
            detector,
            enabled: true,
            shape: ShapeKind::Rectangle,
        }
    }

    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn label(&self) -> &str {
        self.detector.label()
    }
}

pub struct CascadeClassifierGroup {
    slots: Vec<CascadeSlot>,
    primary: usize,
    dependent_params: ScanParams,
    source: Option<PathBuf>,
}

impl CascadeClassifierGroup {
    /// Start a group whose primary is `primary`.
    pub fn new(primary: CascadeSlot) -> Self {
        Self {
            slots: vec![primary],
            primary: 0,
            dependent_params: ScanParams::dependent(),
            source: None,
        }
    }

    /// Add a dependent cascade. A slot with the same label is replaced in
    /// place, so the primary designation survives a replacement.
    pub fn add(&mut self, slot: CascadeSlot) {
        match self.index_of(slot.label()) {
            Some(i) => self.slots[i] = slot,
            None => self.slots.push(slot),
        }
    }

    /// Make `label` the primary. Unknown labels promote the first slot.
    pub fn set_primary(&mut self, label: &str) {
        self.primary = self.index_of(label).unwrap_or(0);
    }

    pub fn primary_label(&self) -> &str {
        self.slots[self.primary].label()
    }

    pub fn set_object_shape(&mut self, label: &str, shape: ShapeKind) {
        if let Some(i) = self.index_of(label) {
            self.slots[i].shape = shape;
        }
    }

    pub fn object_shape(&self, label: &str) -> Option<ShapeKind> {
        self.index_of(label).map(|i| self.slots[i].shape)
    }

    pub fn slots(&self) -> &[CascadeSlot] {
        &self.slots
    }

    /// Override the search parameters used inside primary regions.
    pub fn set_dependent_params(&mut self, params: ScanParams) {
        self.dependent_params = params;
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.label() == label)
    }

    fn to_config(&self) -> CascadeGroupConfig {
        CascadeGroupConfig {
            primary: Some(self.primary_label().to_string()),
            classifiers: self
                .slots
                .iter()
                .map(|slot| {
                    let cascade = slot.detector.to_config();
                    ClassifierEntry {
                        object_label: cascade.object_label,
                        enabled: slot.enabled,
                        shape: slot.shape,
                        cascade_file_path: cascade.cascade_file_path,
                    }
                })
                .collect(),
        }
    }

    pub(crate) fn from_config(
        cfg: &CascadeGroupConfig,
        base_dir: Option<&Path>,
    ) -> Result<Self, String> {
        let mut entries = cfg.classifiers.iter();
        let first = entries
            .next()
            .ok_or_else(|| "classifiers must list at least one cascade".to_string())?;

        let load = |entry: &ClassifierEntry| -> Result<CascadeSlot, String> {
            let cascade = crate::detect::config::CascadeConfig {
                object_label: entry.object_label.clone(),
                cascade_file_path: entry.cascade_file_path.clone(),
            };
            let detector = CascadeClassifierDetector::from_config(&cascade, base_dir)
                .map_err(|e| e.to_string())?;
            Ok(CascadeSlot::new(detector)
                .with_enabled(entry.enabled)
                .with_shape(entry.shape))
        };

        let mut group = Self::new(load(first)?);
        for entry in entries {
            group.add(load(entry)?);
        }
        if let Some(primary) = cfg.primary.as_deref() {
            group.set_primary(primary);
        }
        Ok(group)
    }
}

impl Detector for CascadeClassifierGroup {
    fn name(&self) -> &str {
        self.primary_label()
    }

    fn kind(&self) -> DetectorKind {
        DetectorKind::CascadeGroup
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionCollection, DetectorError> {
        let gray = frame.to_gray();
        let (width, height) = gray.dimensions();
        let primary = &self.slots[self.primary];

        let regions: Vec<_> = primary
            .detector
            .frame_regions(&gray)
            .into_iter()
            .filter_map(|r| r.clipped_to(width, height))
            .collect();

        let mut out: DetectionCollection = regions
            .iter()
            .map(|r| Detection::new(*r, primary.label(), 0.0).with_shape(primary.shape))
            .collect();

        for region in &regions {
            let crop = imageops::crop_imm(
                &gray,
                region.x as u32,
                region.y as u32,
                region.width,
                region.height,
            )
            .to_image();

            for (index, slot) in self.slots.iter().enumerate() {
                if index == self.primary || !slot.enabled {
                    continue;
                }
                for hit in slot.detector.regions(&crop, &self.dependent_params) {
                    let Some(local) = hit.clipped_to(region.width, region.height) else {
                        continue;
                    };
                    out.push(
                        Detection::new(local.translated(region.x, region.y), slot.label(), 0.0)
                            .with_shape(slot.shape),
                    );
                }
            }
        }
        Ok(out)
    }

    fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
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

impl ObjectToggler for CascadeClassifierGroup {
    fn enable_object(&mut self, label: &str, enabled: bool) {
        if let Some(i) = self.index_of(label) {
            self.slots[i].enabled = enabled;
        }
    }

    fn is_object_enabled(&self, label: &str) -> bool {
        self.index_of(label)
            .map(|i| self.slots[i].enabled)
            .unwrap_or(false)
    }

    fn object_labels(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.label().to_string()).collect()
    }
}

impl Serializable for CascadeClassifierGroup {
    fn serialize(&self, path: &Path) -> Result<(), DetectorError> {
        DetectorConfig::CascadeGroup(self.to_config()).write(path)
    }

    fn deserialize(path: &Path) -> Result<Self, DetectorError> {
        match DetectorConfig::read(path)? {
            DetectorConfig::CascadeGroup(cfg) => {
                let mut group = Self::from_config(&cfg, path.parent())
                    .map_err(|reason| DetectorError::format(path, reason))?;
                group.source = Some(path.to_path_buf());
                Ok(group)
            }
            other => Err(DetectorError::format(
                path,
                format!("expected type CASCADE_NETWORK, found {}", other.type_name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detection::Rect;
    use crate::detect::haar::RegionClassifier;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        hits: Vec<Rect>,
        calls: Arc<AtomicUsize>,
    }

    impl RegionClassifier for Scripted {
        fn detect_multi_scale(&self, _image: &GrayImage, _params: &ScanParams) -> Vec<Rect> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hits.clone()
        }
    }

    fn slot(label: &str, hits: Vec<Rect>, calls: &Arc<AtomicUsize>) -> CascadeSlot {
        CascadeSlot::new(CascadeClassifierDetector::with_classifier(
            label,
            format!("{label}.xml"),
            Box::new(Scripted {
                hits,
                calls: calls.clone(),
            }),
        ))
    }

    #[test]
    fn no_primary_region_skips_dependents() {
        let calls = Arc::new(AtomicUsize::new(0));
        let eye_calls = Arc::new(AtomicUsize::new(0));
        let mut group = CascadeClassifierGroup::new(slot("face", vec![], &calls));
        group.add(slot("eyes", vec![Rect::new(1, 1, 5, 5)], &eye_calls));

        let found = group.detect(&Frame::Gray(GrayImage::new(64, 64))).unwrap();
        assert!(found.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(eye_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dependent_hits_are_offset_by_primary_origin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut group = CascadeClassifierGroup::new(slot(
            "face",
            vec![Rect::new(40, 30, 60, 60)],
            &calls,
        ));
        group.add(slot("eyes", vec![Rect::new(10, 12, 15, 8)], &calls).with_shape(ShapeKind::Circle));

        let found = group.detect(&Frame::Gray(GrayImage::new(160, 120))).unwrap();
        assert_eq!(found.len(), 2);
        let face = found.get(0).unwrap();
        assert_eq!(face.label, "face");
        assert_eq!(face.rect, Rect::new(40, 30, 60, 60));
        let eye = found.get(1).unwrap();
        assert_eq!(eye.label, "eyes");
        assert_eq!(eye.rect, Rect::new(50, 42, 15, 8));
        assert_eq!(eye.shape, ShapeKind::Circle);
    }

    #[test]
    fn disabled_dependent_and_unknown_labels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut group = CascadeClassifierGroup::new(slot(
            "face",
            vec![Rect::new(0, 0, 50, 50)],
            &calls,
        ));
        group.add(slot("smile", vec![Rect::new(5, 30, 20, 10)], &calls));

        group.enable_object("smile", false);
        group.enable_object("moustache", true);
        assert!(!group.is_object_enabled("smile"));
        assert!(!group.is_object_enabled("moustache"));

        let found = group.detect(&Frame::Gray(GrayImage::new(80, 80))).unwrap();
        assert_eq!(found.labels(), ["face"]);
    }

    #[test]
    fn shape_changes_apply_and_dependents_stay_inside_primary() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut group = CascadeClassifierGroup::new(slot(
            "face",
            vec![Rect::new(20, 20, 60, 60)],
            &calls,
        ));
        group.add(slot("eyes", vec![Rect::new(50, 50, 30, 30)], &calls));
        assert_eq!(group.object_shape("eyes"), Some(ShapeKind::Rectangle));

        group.set_object_shape("eyes", ShapeKind::Circle);
        group.set_object_shape("nose", ShapeKind::Circle);
        assert_eq!(group.object_shape("eyes"), Some(ShapeKind::Circle));
        assert_eq!(group.object_shape("face"), Some(ShapeKind::Rectangle));
        assert_eq!(group.object_shape("nose"), None);

        let found = group.detect(&Frame::Gray(GrayImage::new(120, 120))).unwrap();
        assert_eq!(found.len(), 2);
        let face = found.get(0).unwrap();
        let eye = found.get(1).unwrap();
        assert_eq!(eye.shape, ShapeKind::Circle);
        assert_eq!(eye.rect, Rect::new(70, 70, 10, 10));
        assert!(face.rect.contains_rect(&eye.rect));
        assert!(!eye.rect.contains_rect(&face.rect));
    }

    #[test]
    fn set_primary_swaps_roles_and_falls_back_to_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut group = CascadeClassifierGroup::new(slot("face", vec![], &calls));
        group.add(slot("eyes", vec![], &calls));
        group.add(slot("smile", vec![], &calls));

        group.set_primary("smile");
        assert_eq!(group.primary_label(), "smile");
        assert_eq!(group.object_labels(), ["face", "eyes", "smile"]);

        group.set_primary("unicorn");
        assert_eq!(group.primary_label(), "face");
    }
}
