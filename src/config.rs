use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::options::FrameOptions;

const DEFAULT_DETECTORS_DIR: &str = "detector_paths";
const DEFAULT_OUTPUT_DIR: &str = "workbench_out";

#[derive(Debug, Deserialize, Default)]
struct WorkbenchConfigFile {
    detectors_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    defaults: Option<DefaultsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DefaultsConfigFile {
    flip_horizontal: Option<bool>,
    show_confidence: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    pub detectors_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source: SourceSettings,
    pub defaults: DefaultSettings,
}

#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    /// Image file, image directory or `stub://N`.
    pub path: Option<String>,
    pub max_frames: Option<u64>,
}

/// Starting values for the option history.
#[derive(Debug, Clone)]
pub struct DefaultSettings {
    pub flip_horizontal: bool,
    pub show_confidence: bool,
}

impl WorkbenchConfig {
    /// Read the TOML file named by `WORKBENCH_CONFIG` (if set), then apply
    /// `WORKBENCH_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WORKBENCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WorkbenchConfigFile) -> Self {
        let fallback = FrameOptions::default();
        let source = file
            .source
            .map(|source| SourceSettings {
                path: source.path,
                max_frames: source.max_frames,
            })
            .unwrap_or_default();
        let defaults = DefaultSettings {
            flip_horizontal: file
                .defaults
                .as_ref()
                .and_then(|d| d.flip_horizontal)
                .unwrap_or(fallback.flip_horizontal),
            show_confidence: file
                .defaults
                .and_then(|d| d.show_confidence)
                .unwrap_or(fallback.show_confidence),
        };
        Self {
            detectors_dir: file
                .detectors_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTORS_DIR)),
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            source,
            defaults,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("WORKBENCH_DETECTORS_DIR") {
            if !dir.trim().is_empty() {
                self.detectors_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("WORKBENCH_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(frames) = std::env::var("WORKBENCH_MAX_FRAMES") {
            if !frames.trim().is_empty() {
                let frames: u64 = frames
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("WORKBENCH_MAX_FRAMES must be an integer frame count"))?;
                self.source.max_frames = Some(frames);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.detectors_dir.as_os_str().is_empty() {
            return Err(anyhow!("detectors_dir must not be empty"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.source.max_frames == Some(0) {
            return Err(anyhow!("source.max_frames must be greater than zero"));
        }
        if let Some(path) = &self.source.path {
            if path.trim().is_empty() {
                return Err(anyhow!("source.path must not be empty"));
            }
        }
        Ok(())
    }

    /// Options every new session starts from.
    pub fn initial_options(&self) -> FrameOptions {
        FrameOptions {
            flip_horizontal: self.defaults.flip_horizontal,
            show_confidence: self.defaults.show_confidence,
            ..FrameOptions::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<WorkbenchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
