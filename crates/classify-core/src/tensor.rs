//! Tensor abstraction and the host-memory tensor used by CPU backends

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// A typed, shaped `f32` buffer bound to a network
///
/// Input tensors report `[width, height, channels]`; output tensors report the
/// flat score width as their first dimension.
pub trait Tensor: Send {
    /// Tensor name as bound on the network
    fn name(&self) -> &str;

    /// Length of every dimension
    fn shape(&self) -> &[usize];

    /// Backing buffer, `None` when nothing is allocated
    fn data(&self) -> Option<&[f32]>;

    /// Mutable backing buffer, `None` when nothing is allocated
    fn data_mut(&mut self) -> Option<&mut [f32]>;

    /// Length along `axis`, 0 when the axis does not exist
    fn dim(&self, axis: usize) -> usize {
        self.shape().get(axis).copied().unwrap_or(0)
    }

    /// Name and shape snapshot
    fn info(&self) -> TensorInfo {
        TensorInfo {
            name: self.name().to_string(),
            shape: self.shape().to_vec(),
        }
    }
}

/// Name and shape of a bound tensor, returned by introspection commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Tensor stored in host memory
#[derive(Debug, Clone)]
pub struct HostTensor {
    name: String,
    shape: Vec<usize>,
    data: Option<ArrayD<f32>>,
}

impl HostTensor {
    /// Create a zero-filled tensor
    pub fn zeros(name: impl Into<String>, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            data: Some(ArrayD::zeros(IxDyn(shape))),
        }
    }

    /// Create a tensor with a known name but no shape or buffer yet
    pub fn unallocated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: Vec::new(),
            data: None,
        }
    }

    /// Create a tensor from existing values
    pub fn from_vec(
        name: impl Into<String>,
        shape: &[usize],
        values: Vec<f32>,
    ) -> Result<Self, ndarray::ShapeError> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Ok(Self {
            name: name.into(),
            shape: shape.to_vec(),
            data: Some(data),
        })
    }

    /// Replace shape and contents
    pub fn set_values(&mut self, shape: &[usize], values: Vec<f32>) -> Result<(), ndarray::ShapeError> {
        self.data = Some(ArrayD::from_shape_vec(IxDyn(shape), values)?);
        self.shape = shape.to_vec();
        Ok(())
    }

    /// Allocate a zero-filled buffer of the given shape
    pub fn allocate(&mut self, shape: &[usize]) {
        self.data = Some(ArrayD::zeros(IxDyn(shape)));
        self.shape = shape.to_vec();
    }

    /// Drop the backing buffer, keeping name and shape
    pub fn release(&mut self) {
        self.data = None;
    }
}

impl Tensor for HostTensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Option<&[f32]> {
        self.data.as_ref().and_then(|a| a.as_slice())
    }

    fn data_mut(&mut self) -> Option<&mut [f32]> {
        self.data.as_mut().and_then(|a| a.as_slice_mut())
    }
}
