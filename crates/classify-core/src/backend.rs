//! Network backend trait and related types

use crate::error::BackendError;
use crate::tensor::Tensor;
use npu_classify_common::TensorKind;
use std::path::Path;
use std::time::Duration;

/// A neural-network resource driven by the lifecycle controller
///
/// A backend owns its tensors. Input tensors are created before load and are
/// filled by preprocessing; output tensors expose scores after `run`.
pub trait NeuralNetwork: Send {
    /// Materialize an input tensor with the given name
    fn create_input_tensor(&mut self, name: &str) -> Result<(), BackendError>;

    /// Materialize an output tensor with the given name
    fn create_output_tensor(&mut self, name: &str) -> Result<(), BackendError>;

    /// Load the model found at `model_path`
    ///
    /// `mean` and `scale` are per-channel normalization constants applied to
    /// the raw RGB input as `(x - mean) * scale`.
    fn load(&mut self, model_path: &Path, mean: &[f32], scale: &[f32]) -> Result<(), BackendError>;

    /// Run one forward pass over the current input tensors
    fn run(&mut self) -> Result<ExecutionStats, BackendError>;

    /// Release everything the backend holds for this network
    fn unload(&mut self);

    fn input_tensor_count(&self) -> usize;

    fn output_tensor_count(&self) -> usize;

    fn input_tensor(&self, index: usize) -> Option<&dyn Tensor>;

    fn input_tensor_mut(&mut self, index: usize) -> Option<&mut dyn Tensor>;

    fn output_tensor(&self, index: usize) -> Option<&dyn Tensor>;

    fn input_tensor_by_name(&self, name: &str) -> Option<&dyn Tensor> {
        (0..self.input_tensor_count())
            .filter_map(|i| self.input_tensor(i))
            .find(|t| t.name() == name)
    }

    fn output_tensor_by_name(&self, name: &str) -> Option<&dyn Tensor> {
        (0..self.output_tensor_count())
            .filter_map(|i| self.output_tensor(i))
            .find(|t| t.name() == name)
    }

    /// Materialize a tensor of either kind
    fn create_tensor(&mut self, kind: TensorKind, name: &str) -> Result<(), BackendError> {
        match kind {
            TensorKind::Input => self.create_input_tensor(name),
            TensorKind::Output => self.create_output_tensor(name),
        }
    }

    fn tensor_count(&self, kind: TensorKind) -> usize {
        match kind {
            TensorKind::Input => self.input_tensor_count(),
            TensorKind::Output => self.output_tensor_count(),
        }
    }

    fn tensor(&self, kind: TensorKind, index: usize) -> Option<&dyn Tensor> {
        match kind {
            TensorKind::Input => self.input_tensor(index),
            TensorKind::Output => self.output_tensor(index),
        }
    }

    fn tensor_by_name(&self, kind: TensorKind, name: &str) -> Option<&dyn Tensor> {
        match kind {
            TensorKind::Input => self.input_tensor_by_name(name),
            TensorKind::Output => self.output_tensor_by_name(name),
        }
    }
}

/// Creates empty network handles for `create_network`
pub trait NetworkFactory: Send {
    fn create(&self, model_name: &str) -> Result<Box<dyn NeuralNetwork>, BackendError>;
}

impl<F> NetworkFactory for F
where
    F: Fn(&str) -> Result<Box<dyn NeuralNetwork>, BackendError> + Send,
{
    fn create(&self, model_name: &str) -> Result<Box<dyn NeuralNetwork>, BackendError> {
        self(model_name)
    }
}

/// Statistics reported by one forward pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecutionStats {
    /// Wall time spent in the backend
    pub duration: Duration,
}
