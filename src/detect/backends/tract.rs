#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{InferenceBackend, InputBlob, OutputTensor};

/// ONNX inference through tract.
///
/// The model is loaded from a local file with a fixed `1x3xHxW` f32 input.
/// When `output_layer` is given, that node replaces the model's declared
/// outputs.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        output_layer: Option<&str>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let mut model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?;

        if let Some(layer) = output_layer {
            model = model
                .with_output_names([layer])
                .with_context(|| format!("model has no output layer named {layer}"))?;
        }

        let model = model
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, blob: &InputBlob) -> Result<Tensor> {
        let [_, channels, h, w] = blob.shape();
        if w != self.width as usize || h != self.height as usize {
            return Err(anyhow!(
                "blob size {}x{} does not match model input {}x{}",
                w,
                h,
                self.width,
                self.height
            ));
        }
        let input = tract_ndarray::Array4::from_shape_fn((1, channels, h, w), |(_, c, y, x)| {
            blob.at(c, y, x)
        });
        Ok(input.into_tensor())
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn forward(&mut self, input: &InputBlob) -> Result<OutputTensor> {
        let input = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        Ok(OutputTensor::new(
            view.shape().to_vec(),
            view.iter().copied().collect(),
        ))
    }

    fn warm_up(&mut self) -> Result<()> {
        let blob = InputBlob::from_rgb(
            &image::RgbImage::new(self.width, self.height),
            self.width,
            self.height,
            1.0,
        );
        self.forward(&blob).map(|_| ())
    }
}
