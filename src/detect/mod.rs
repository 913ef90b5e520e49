pub mod backend;
pub mod backends;
pub mod builder;
pub mod catalog;
pub mod cascade;
pub mod collection;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod factory;
pub mod group;
pub mod haar;
pub mod network;
pub mod nms;
pub mod onnx;

pub use backend::{InferenceBackend, InputBlob, OutputTensor};
pub use backends::StubBackend;
pub use cascade::CascadeClassifierDetector;
pub use catalog::DetectorCatalog;
pub use collection::{order_labels_by_presence, DetectionCollection};
pub use config::DetectorConfig;
pub use detection::{Color, Detection, Rect, ShapeKind};
pub use detector::{Detector, DetectorKind, ObjectToggler, Serializable, ThresholdAdjuster};
pub use error::DetectorError;
pub use factory::DetectorFactory;
pub use group::{CascadeClassifierGroup, CascadeSlot};
pub use haar::{HaarCascade, RegionClassifier, ScanParams};
pub use network::NeuralNetworkDetector;
pub use onnx::OnnxDetector;
