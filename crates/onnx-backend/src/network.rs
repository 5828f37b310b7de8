//! [`NeuralNetwork`] implementation backed by an ONNX Runtime session

use crate::error::OnnxError;
use crate::normalize::Normalization;
use crate::OnnxConfig;
use npu_classify_core::{
    BackendError, ExecutionStats, HostTensor, NetworkFactory, NeuralNetwork, Tensor,
};
use ort::{session::Session, value::TensorRef};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Classification network running on ONNX Runtime (CPU)
///
/// Input tensors are host buffers of `[width, height, 3]` filled by the
/// classifier's resizer. The first input is normalized and fed to the model;
/// each bound output tensor receives the model output of the same name,
/// flattened.
pub struct OnnxNetwork {
    model_name: String,
    config: OnnxConfig,
    session: Option<Session>,
    normalization: Option<Normalization>,
    inputs: Vec<HostTensor>,
    outputs: Vec<HostTensor>,
}

impl OnnxNetwork {
    pub fn new(model_name: &str, config: OnnxConfig) -> Self {
        Self {
            model_name: model_name.to_string(),
            config,
            session: None,
            normalization: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }
}

impl NeuralNetwork for OnnxNetwork {
    fn create_input_tensor(&mut self, name: &str) -> Result<(), BackendError> {
        let shape = [self.config.input_width, self.config.input_height, 3];
        self.inputs.push(HostTensor::zeros(name, &shape));
        Ok(())
    }

    fn create_output_tensor(&mut self, name: &str) -> Result<(), BackendError> {
        self.outputs.push(HostTensor::unallocated(name));
        Ok(())
    }

    fn load(&mut self, model_path: &Path, mean: &[f32], scale: &[f32]) -> Result<(), BackendError> {
        if !model_path.exists() {
            return Err(BackendError::ModelNotFound(model_path.display().to_string()));
        }

        info!("Loading {} from {:?}", self.model_name, model_path);
        let normalization = Normalization::new(mean, scale)?;

        let session = Session::builder()
            .map_err(|e| OnnxError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| OnnxError::ModelLoad(e.to_string()))?;

        self.session = Some(session);
        self.normalization = Some(normalization);
        info!("{} loaded successfully", self.model_name);
        Ok(())
    }

    fn run(&mut self) -> Result<ExecutionStats, BackendError> {
        let start = Instant::now();

        let session = self.session.as_mut().ok_or(BackendError::NotLoaded)?;
        let normalization = self.normalization.as_ref().ok_or(BackendError::NotLoaded)?;
        let input = self
            .inputs
            .first()
            .ok_or_else(|| BackendError::Tensor("no input tensor".to_string()))?;

        let batch = normalization.to_batch(input)?;

        // Zero-copy tensor: use view instead of clone
        let input_tensor = TensorRef::from_array_view(batch.view())
            .map_err(|e| OnnxError::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| OnnxError::Inference(e.to_string()))?;

        for output in &mut self.outputs {
            let value = outputs.get(output.name()).ok_or_else(|| {
                OnnxError::Inference(format!("model has no output named {}", output.name()))
            })?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| OnnxError::Inference(format!("Failed to extract tensor: {e}")))?;
            debug!("{}: output {} shape {:?}", self.model_name, output.name(), shape);

            output
                .set_values(&[data.len()], data.to_vec())
                .map_err(OnnxError::from)?;
        }

        Ok(ExecutionStats {
            duration: start.elapsed(),
        })
    }

    fn unload(&mut self) {
        self.session = None;
        self.normalization = None;
        self.inputs.clear();
        self.outputs.clear();
        debug!("{} unloaded", self.model_name);
    }

    fn input_tensor_count(&self) -> usize {
        self.inputs.len()
    }

    fn output_tensor_count(&self) -> usize {
        self.outputs.len()
    }

    fn input_tensor(&self, index: usize) -> Option<&dyn Tensor> {
        self.inputs.get(index).map(|t| t as &dyn Tensor)
    }

    fn input_tensor_mut(&mut self, index: usize) -> Option<&mut dyn Tensor> {
        self.inputs.get_mut(index).map(|t| t as &mut dyn Tensor)
    }

    fn output_tensor(&self, index: usize) -> Option<&dyn Tensor> {
        self.outputs.get(index).map(|t| t as &dyn Tensor)
    }
}

/// Creates [`OnnxNetwork`] handles for the classifier
///
/// # Example
/// ```no_run
/// use npu_classify_core::Classifier;
/// use npu_classify_onnx::{OnnxConfig, OnnxNetworkFactory};
///
/// let classifier = Classifier::builder(OnnxNetworkFactory::new(OnnxConfig::default()))
///     .build()
///     .unwrap();
/// classifier.handle_request(r#"{"mode":"create_network","model_name":"mobilenet_v2.onnx"}"#);
/// ```
#[derive(Debug, Clone, Default)]
pub struct OnnxNetworkFactory {
    config: OnnxConfig,
}

impl OnnxNetworkFactory {
    pub fn new(config: OnnxConfig) -> Self {
        Self { config }
    }
}

impl NetworkFactory for OnnxNetworkFactory {
    fn create(&self, model_name: &str) -> Result<Box<dyn NeuralNetwork>, BackendError> {
        Ok(Box::new(OnnxNetwork::new(model_name, self.config.clone())))
    }
}
