use std::path::Path;

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

use crate::detect::error::DetectorError;

/// NCHW `f32` blob with a batch of one.
#[derive(Clone, Debug, PartialEq)]
pub struct InputBlob {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl InputBlob {
    /// Resize `image` to `width`x`height` and lay it out plane by plane,
    /// multiplying every sample by `scale`.
    pub fn from_rgb(image: &RgbImage, width: u32, height: u32, scale: f32) -> Self {
        let resized;
        let source = if image.dimensions() == (width, height) {
            image
        } else {
            resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
            &resized
        };

        let (w, h) = (width as usize, height as usize);
        let mut data = vec![0.0f32; 3 * w * h];
        for (x, y, pixel) in source.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for channel in 0..3 {
                data[channel * w * h + offset] = pixel[channel] as f32 * scale;
            }
        }
        Self {
            width: w,
            height: h,
            data,
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height, self.width]
    }

    /// Sample at `(channel, y, x)`.
    pub fn at(&self, channel: usize, y: usize, x: usize) -> f32 {
        self.data[(channel * self.height + y) * self.width + x]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// First model output, flattened in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl OutputTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Build a `[1, rows, width]` tensor from row slices.
    pub fn from_rows(rows: &[&[f32]]) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let data: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::new(vec![1, rows.len(), width], data)
    }

    /// Size of the innermost dimension.
    pub fn row_width(&self) -> usize {
        self.shape.last().copied().unwrap_or(0)
    }

    /// Iterate over innermost rows, requiring them to be at least `min_width`
    /// values wide.
    pub fn rows(&self, min_width: usize) -> Result<std::slice::ChunksExact<'_, f32>> {
        let width = self.row_width();
        let expected: usize = self.shape.iter().product();
        if width < min_width || width == 0 {
            return Err(anyhow!(
                "output rows are {} values wide, need at least {}",
                width,
                min_width
            ));
        }
        if expected != self.data.len() {
            return Err(anyhow!(
                "output shape {:?} does not match {} values",
                self.shape,
                self.data.len()
            ));
        }
        Ok(self.data.chunks_exact(width))
    }
}

/// Forward-pass seam used by the neural-network detectors.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Model input as `(width, height)`.
    fn input_size(&self) -> (u32, u32);

    /// Run the model on one blob and return its detection output.
    fn forward(&mut self, input: &InputBlob) -> Result<OutputTensor>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// How to load a model file.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendOptions {
    pub input_size: (u32, u32),
    pub output_layer: Option<String>,
}

/// Load `model` with the compiled-in backend.
///
/// `config` is only checked for presence; the tract backend reads the graph
/// and weights from `model` alone.
pub fn load_backend(
    model: &Path,
    config: Option<&Path>,
    options: &BackendOptions,
) -> Result<Box<dyn InferenceBackend>, DetectorError> {
    if let Some(cfg) = config {
        if !cfg.is_file() {
            return Err(DetectorError::model_load(
                model,
                config,
                "config file does not exist",
            ));
        }
    }
    load_compiled(model, options)
        .map_err(|e| DetectorError::model_load(model, config, format!("{e:#}")))
}

#[cfg(feature = "backend-tract")]
fn load_compiled(model: &Path, options: &BackendOptions) -> Result<Box<dyn InferenceBackend>> {
    let (width, height) = options.input_size;
    let mut backend = crate::detect::backends::TractBackend::new(
        model,
        width,
        height,
        options.output_layer.as_deref(),
    )?;
    backend.warm_up()?;
    log::info!(
        "loaded {} with tract ({}x{})",
        model.display(),
        width,
        height
    );
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_compiled(_model: &Path, _options: &BackendOptions) -> Result<Box<dyn InferenceBackend>> {
    anyhow::bail!("built without an inference backend (enable feature `backend-tract`)")
}
