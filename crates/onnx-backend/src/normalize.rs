//! Input normalization into the NCHW layout ONNX classifiers expect

use crate::error::OnnxError;
use ndarray::Array4;
use npu_classify_core::Tensor;

/// Per-channel `(x - mean) * scale`
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl Normalization {
    pub fn new(mean: &[f32], scale: &[f32]) -> Result<Self, OnnxError> {
        if mean.is_empty() || mean.len() != scale.len() {
            return Err(OnnxError::Normalization(format!(
                "mean has {} channels, scale has {}",
                mean.len(),
                scale.len()
            )));
        }
        Ok(Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        })
    }

    pub fn channels(&self) -> usize {
        self.mean.len()
    }

    /// Build a `(1, C, H, W)` batch from a planar `[W, H, C]` input tensor
    pub fn to_batch(&self, input: &dyn Tensor) -> Result<Array4<f32>, OnnxError> {
        let (width, height, channels) = (input.dim(0), input.dim(1), input.dim(2));
        if channels != self.channels() {
            return Err(OnnxError::Shape(format!(
                "{}: {} channels, normalization has {}",
                input.name(),
                channels,
                self.channels()
            )));
        }

        let data = input
            .data()
            .ok_or_else(|| OnnxError::Shape(format!("{}: no buffer", input.name())))?;
        let plane = width * height;
        if data.len() < plane * channels {
            return Err(OnnxError::Shape(format!(
                "{}: buffer holds {} values, need {}",
                input.name(),
                data.len(),
                plane * channels
            )));
        }

        let mut batch = Array4::zeros((1, channels, height, width));
        for c in 0..channels {
            let (mean, scale) = (self.mean[c], self.scale[c]);
            let src = &data[c * plane..(c + 1) * plane];
            for (dst, &x) in batch
                .index_axis_mut(ndarray::Axis(1), c)
                .iter_mut()
                .zip(src)
            {
                *dst = (x - mean) * scale;
            }
        }

        Ok(batch)
    }
}
