use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::backend::{InferenceBackend, InputBlob, OutputTensor};

/// Backend that replays a canned output tensor.
///
/// Used to drive the network detectors without model files. Every blob it
/// receives is recorded by shape.
pub struct StubBackend {
    input_size: (u32, u32),
    output: Result<OutputTensor, String>,
    seen: Arc<Mutex<Vec<[usize; 4]>>>,
}

impl StubBackend {
    pub fn new(input_size: (u32, u32), output: OutputTensor) -> Self {
        Self {
            input_size,
            output: Ok(output),
            seen: Arc::default(),
        }
    }

    /// Backend whose forward pass always fails with `reason`.
    pub fn failing(input_size: (u32, u32), reason: impl Into<String>) -> Self {
        Self {
            input_size,
            output: Err(reason.into()),
            seen: Arc::default(),
        }
    }

    /// Shapes of the blobs passed to `forward`, shared with the backend.
    pub fn seen_inputs(&self) -> Arc<Mutex<Vec<[usize; 4]>>> {
        self.seen.clone()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn forward(&mut self, input: &InputBlob) -> Result<OutputTensor> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(input.shape());
        }
        self.output.clone().map_err(|reason| anyhow!(reason))
    }
}
