//! Detection workbench
//!
//! Runs pluggable object detectors over frames after an undoable chain of
//! image filters.
//!
//! # Module Structure
//!
//! - `detect`: detector contract, Haar cascade, cascade group and network
//!   detectors, factory, catalog and builder
//! - `options`: `FrameOptions` snapshots and the bounded undo/redo history
//! - `processing`: image filters applied in a fixed order
//! - `ingest`: frame sources (still image, image directory, `stub://`)
//! - `workbench`: session tying options, detector and frames together
//! - `config`, `ui`: application configuration and terminal feedback

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod options;
pub mod processing;
pub mod ui;
pub mod workbench;

pub use config::WorkbenchConfig;
pub use detect::builder;
pub use detect::{
    CascadeClassifierDetector, CascadeClassifierGroup, Detection, DetectionCollection, Detector,
    DetectorCatalog, DetectorConfig, DetectorError, DetectorFactory, DetectorKind,
    NeuralNetworkDetector, ObjectToggler, OnnxDetector, Rect, Serializable, ShapeKind,
    ThresholdAdjuster,
};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource};
pub use options::{FrameOptions, OptionsHistory, RevertableOption};
pub use workbench::{FrameOutcome, Workbench};
