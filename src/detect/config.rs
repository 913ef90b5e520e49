//! On-disk detector description.
//!
//! One YAML file per detector. The `type` key selects the variant:
//!
//! ```yaml
//! type: CASCADE_NETWORK
//! primary: face
//! classifiers:
//!   - objectLabel: face
//!     enabled: true
//!     shape: RECTANGLE
//!     cascadeFilePath: cascades/haarcascade_frontalface_default.xml
//!   - objectLabel: eyes
//!     enabled: false
//!     shape: CIRCLE
//!     cascadeFilePath: cascades/haarcascade_eye.xml
//! ```
//!
//! Relative paths are looked up next to the YAML file first, then relative to
//! the working directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detect::detection::ShapeKind;
use crate::detect::error::DetectorError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectorConfig {
    #[serde(rename = "CASCADE")]
    Cascade(CascadeConfig),
    #[serde(rename = "CASCADE_NETWORK", alias = "CASCADE_GROUP")]
    CascadeGroup(CascadeGroupConfig),
    #[serde(rename = "NETWORK")]
    Network(NetworkConfig),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeConfig {
    pub object_label: String,
    pub cascade_file_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierEntry {
    pub object_label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub shape: ShapeKind,
    pub cascade_file_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeGroupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    pub classifiers: Vec<ClassifierEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub model_file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<PathBuf>,
    pub labels_file_path: PathBuf,
    #[serde(default)]
    pub disabled_class_names: Vec<String>,
    /// Graph node read as the detection output. Defaults to the model's
    /// declared output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_layer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_height: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl DetectorConfig {
    pub fn read(path: &Path) -> Result<Self, DetectorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| DetectorError::io(path, e))?;
        Self::from_yaml(&raw).map_err(|reason| DetectorError::format(path, reason))
    }

    pub fn from_yaml(raw: &str) -> Result<Self, String> {
        let cfg: DetectorConfig = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn write(&self, path: &Path) -> Result<(), DetectorError> {
        let text =
            serde_yaml::to_string(self).map_err(|e| DetectorError::format(path, e.to_string()))?;
        std::fs::write(path, text).map_err(|e| DetectorError::io(path, e))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DetectorConfig::Cascade(_) => "CASCADE",
            DetectorConfig::CascadeGroup(_) => "CASCADE_NETWORK",
            DetectorConfig::Network(_) => "NETWORK",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            DetectorConfig::Cascade(c) => {
                require_text("objectLabel", &c.object_label)?;
                require_path("cascadeFilePath", &c.cascade_file_path)
            }
            DetectorConfig::CascadeGroup(g) => {
                if g.classifiers.is_empty() {
                    return Err("classifiers must list at least one cascade".into());
                }
                for entry in &g.classifiers {
                    require_text("objectLabel", &entry.object_label)?;
                    require_path("cascadeFilePath", &entry.cascade_file_path)?;
                }
                Ok(())
            }
            DetectorConfig::Network(n) => {
                require_path("modelFilePath", &n.model_file_path)?;
                require_path("labelsFilePath", &n.labels_file_path)?;
                if n.input_width == Some(0) || n.input_height == Some(0) {
                    return Err("input size must be non-zero".into());
                }
                Ok(())
            }
        }
    }
}

impl NetworkConfig {
    /// True when the model file should be run as a YOLO-style ONNX export.
    pub fn is_onnx(&self) -> bool {
        self.model_file_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("onnx"))
    }
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn require_path(field: &str, value: &Path) -> Result<(), String> {
    require_text(field, &value.to_string_lossy())
}

/// Resolve a path written in a detector file located in `base_dir`.
pub fn resolve_path(base_dir: Option<&Path>, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    if let Some(dir) = base_dir {
        let beside = dir.join(path);
        if beside.exists() {
            return beside;
        }
    }
    path.to_path_buf()
}
