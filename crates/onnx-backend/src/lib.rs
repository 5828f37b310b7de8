//! ONNX Runtime backend for the NPU classifier
//!
//! Runs classification models exported to ONNX on the CPU, standing in for
//! the device runtime during development and testing.
//!
//! # Features
//! - `onnx`: builds [`OnnxNetwork`] and [`OnnxNetworkFactory`] on top of `ort`
//!
//! Input normalization ([`Normalization`]) is always available.

pub mod error;
pub mod normalize;

#[cfg(feature = "onnx")]
mod network;

pub use error::OnnxError;
pub use normalize::Normalization;

#[cfg(feature = "onnx")]
pub use network::{OnnxNetwork, OnnxNetworkFactory};

use serde::{Deserialize, Serialize};

/// Input geometry for networks created by this backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxConfig {
    /// Input tensor width in pixels
    pub input_width: usize,
    /// Input tensor height in pixels
    pub input_height: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            input_width: 224,
            input_height: 224,
        }
    }
}
