//! Error kinds raised by detectors and their config files.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    /// Cascade or network weights could not be loaded.
    #[error("failed to load model {model} (config: {config}): {reason}")]
    ModelLoad {
        model: String,
        config: String,
        reason: String,
    },

    /// A detector config file is malformed or missing required fields.
    #[error("invalid detector file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Forward pass failed or produced output that cannot be decoded.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("{detector} expects a {expected}-channel frame, got {found} channel(s)")]
    IncompatibleFrame {
        detector: String,
        expected: u8,
        found: u8,
    },
}

impl DetectorError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DetectorError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(path: &Path, reason: impl Into<String>) -> Self {
        DetectorError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_load(model: &Path, config: Option<&Path>, reason: impl ToString) -> Self {
        DetectorError::ModelLoad {
            model: model.display().to_string(),
            config: config
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            reason: reason.to_string(),
        }
    }
}
