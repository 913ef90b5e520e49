//! Detection session.
//!
//! A [`Workbench`] owns the option history and the selected detector and runs
//! the per-frame pipeline: filters, flips, detection, annotation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::detect::{
    order_labels_by_presence, DetectionCollection, Detector, DetectorFactory, ObjectToggler,
    Serializable, ThresholdAdjuster,
};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::options::{FrameOptions, OptionsHistory, RevertableOption};
use crate::processing::{apply_algorithms, flip};

/// Result of pushing one frame through the pipeline.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    /// Filtered, flipped and (when a detector ran) annotated frame.
    pub frame: Frame,
    pub detections: DetectionCollection,
    /// Status-bar text, if there is anything to report.
    pub status: Option<String>,
}

pub struct Workbench {
    history: OptionsHistory,
    detector: Option<Box<dyn Detector>>,
    last_detections: DetectionCollection,
}

impl Workbench {
    pub fn new(initial: FrameOptions) -> Self {
        Self {
            history: OptionsHistory::new(initial),
            detector: None,
            last_detections: DetectionCollection::new(),
        }
    }

    pub fn options(&self) -> &FrameOptions {
        self.history.current()
    }

    pub fn history(&self) -> &OptionsHistory {
        &self.history
    }

    /// Record an option change.
    pub fn set_option(&mut self, option: RevertableOption, value: i16) {
        self.history.add(option, value);
        log::debug!("{} set to {}", option, value);
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        self.history.undo();
        log::info!("undo {}", self.history.last_change());
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        self.history.redo();
        log::info!("redo {}", self.history.last_change());
        true
    }

    /// Forget undo/redo for a new frame source. Filters stay as they are;
    /// only the flips are preset, with camera feeds mirrored.
    pub fn source_changed(&mut self, is_camera: bool) {
        let current = *self.history.current();
        self.history.reset();
        self.history.set_current(FrameOptions {
            flip_horizontal: is_camera,
            flip_vertical: false,
            ..current
        });
    }

    pub fn detector(&self) -> Option<&dyn Detector> {
        self.detector.as_deref()
    }

    /// Swap in the detector described by `path`. The current detector is
    /// released first, so a failed load leaves no detector selected.
    pub fn select_detector(&mut self, path: &Path) -> bool {
        self.release_detector();
        self.detector = DetectorFactory::create_detector_from_file(path);
        self.detector.is_some()
    }

    /// Use an already constructed detector.
    pub fn set_detector(&mut self, detector: Box<dyn Detector>) {
        self.release_detector();
        log::info!("selected {} detector {}", detector.kind(), detector.name());
        self.detector = Some(detector);
    }

    /// Drop the current detector, writing its state back to its source file.
    pub fn release_detector(&mut self) {
        let Some(detector) = self.detector.take() else {
            return;
        };
        self.last_detections = DetectionCollection::new();
        if let (Some(serializable), Some(path)) =
            (detector.as_serializable(), detector.source_path())
        {
            match serializable.serialize(path) {
                Ok(()) => log::info!("saved {} to {}", detector.name(), path.display()),
                Err(err) => log::warn!("could not save {}: {}", detector.name(), err),
            }
        }
        log::info!("released detector {}", detector.name());
    }

    /// Forward a threshold to the detector. `false` when the detector has
    /// no threshold.
    pub fn adjust_threshold(&mut self, threshold: f32) -> bool {
        match self
            .detector
            .as_mut()
            .and_then(|d| d.as_threshold_adjuster_mut())
        {
            Some(adjuster) => {
                adjuster.adjust_threshold(threshold);
                true
            }
            None => false,
        }
    }

    pub fn enable_object(&mut self, label: &str, enabled: bool) -> bool {
        match self.detector.as_mut().and_then(|d| d.as_object_toggler_mut()) {
            Some(toggler) => {
                toggler.enable_object(label, enabled);
                true
            }
            None => false,
        }
    }

    /// Labels of the selected detector with their enabled state. Labels
    /// seen in the last frame come first.
    pub fn object_labels(&self) -> Vec<(String, bool)> {
        let Some(toggler) = self.detector.as_ref().and_then(|d| d.as_object_toggler()) else {
            return Vec::new();
        };
        order_labels_by_presence(&toggler.object_labels(), &self.last_detections)
            .into_iter()
            .map(|label| {
                let enabled = toggler.is_object_enabled(&label);
                (label, enabled)
            })
            .collect()
    }

    /// Run the pipeline on one frame.
    ///
    /// A failing detector is logged and dropped; the frame then comes back
    /// filtered but unannotated.
    pub fn process_frame(&mut self, input: &Frame) -> FrameOutcome {
        let options = *self.history.current();
        let filtered = apply_algorithms(input, &options);
        let mut frame = flip(&filtered, options.flip_horizontal, options.flip_vertical);

        if options.confidence > 0 {
            self.adjust_threshold(f32::from(options.confidence) / 100.0);
        }

        let Some(detector) = self.detector.as_mut() else {
            return FrameOutcome {
                frame,
                detections: DetectionCollection::new(),
                status: None,
            };
        };

        match detector.detect(&frame) {
            Ok(mut detections) => {
                detections.set_show_confidence(options.show_confidence);
                detections.apply_label_colors();
                detections.render(&mut frame);
                let status = detections.status_line();
                self.last_detections = detections.clone();
                FrameOutcome {
                    frame,
                    detections,
                    status,
                }
            }
            Err(err) => {
                let name = detector.name().to_string();
                log::warn!("detector {name} failed: {err}; deselecting it");
                self.detector = None;
                self.last_detections = DetectionCollection::new();
                FrameOutcome {
                    frame,
                    detections: DetectionCollection::new(),
                    status: Some(format!("Detector {name} failed: {err}")),
                }
            }
        }
    }

    /// Pull frames from `source` until it runs dry or `keep_running` is
    /// cleared. Returns the number of frames processed.
    ///
    /// The source must already be connected; call [`Self::source_changed`]
    /// before this when switching sources.
    pub fn run<F>(
        &mut self,
        source: &mut dyn FrameSource,
        keep_running: &Arc<AtomicBool>,
        mut sink: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, &FrameOutcome) -> Result<()>,
    {
        log::info!("processing frames from {}", source.describe());

        let mut processed = 0u64;
        while keep_running.load(Ordering::SeqCst) {
            if !source.is_healthy() {
                log::warn!("{} is unhealthy, stopping", source.describe());
                break;
            }
            let Some(frame) = source.next_frame()? else {
                break;
            };
            let outcome = self.process_frame(&frame);
            sink(processed, &outcome)?;
            processed += 1;
        }

        let stats = source.stats();
        log::info!(
            "stopped after {} frames ({} read from {})",
            processed,
            stats.frames_read,
            stats.location
        );
        Ok(processed)
    }
}

impl Drop for Workbench {
    fn drop(&mut self) {
        self.release_detector();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, DetectorError, DetectorKind, Rect};

    struct Flaky {
        calls: usize,
    }

    impl Detector for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn kind(&self) -> DetectorKind {
            DetectorKind::Cascade
        }

        fn detect(&mut self, _frame: &Frame) -> Result<DetectionCollection, DetectorError> {
            self.calls += 1;
            if self.calls > 1 {
                return Err(DetectorError::Inference("device lost".into()));
            }
            Ok(vec![Detection::new(Rect::new(1, 1, 4, 4), "thing", 0.0)]
                .into_iter()
                .collect())
        }
    }

    fn gray(side: u32) -> Frame {
        Frame::Gray(image::GrayImage::from_pixel(side, side, image::Luma([40])))
    }

    #[test]
    fn failing_detector_is_dropped() {
        let mut bench = Workbench::new(FrameOptions::default());
        bench.set_detector(Box::new(Flaky { calls: 0 }));

        let first = bench.process_frame(&gray(8));
        assert_eq!(first.detections.len(), 1);
        assert_eq!(
            first.status.as_deref(),
            Some("Detected thing at: <1 1> - <5 5>")
        );

        let second = bench.process_frame(&gray(8));
        assert!(second.detections.is_empty());
        assert!(second.status.unwrap().contains("device lost"));
        assert!(bench.detector().is_none());
    }

    #[test]
    fn undo_restores_filters_for_next_frame() {
        let mut bench = Workbench::new(FrameOptions {
            flip_horizontal: false,
            ..FrameOptions::default()
        });
        let frame = gray(6);
        bench.set_option(RevertableOption::BinaryThresholding, 20);
        let thresholded = bench.process_frame(&frame).frame;
        assert_ne!(thresholded, frame);

        assert!(bench.undo());
        assert_eq!(bench.process_frame(&frame).frame, frame);
        assert!(bench.redo());
        assert!(!bench.redo());
    }

    #[test]
    fn source_change_presets_flip_and_keeps_filters() {
        let mut bench = Workbench::new(FrameOptions::default());
        bench.set_option(RevertableOption::Sobel, 1);
        bench.set_option(RevertableOption::BinaryThresholding, 90);
        bench.set_option(RevertableOption::FlipVertical, 1);
        bench.source_changed(false);
        assert!(!bench.options().flip_horizontal);
        assert!(!bench.options().flip_vertical);
        assert!(bench.options().sobel);
        assert_eq!(bench.options().binary_threshold, 90);
        assert!(!bench.history().can_undo());
        assert!(!bench.history().can_redo());

        bench.source_changed(true);
        assert!(bench.options().flip_horizontal);
        assert!(bench.options().sobel);
        assert_eq!(bench.options().binary_threshold, 90);
    }

    #[test]
    fn capability_calls_without_detector_report_false() {
        let mut bench = Workbench::new(FrameOptions::default());
        assert!(!bench.adjust_threshold(0.3));
        assert!(!bench.enable_object("face", false));
        assert!(bench.object_labels().is_empty());
    }
}
