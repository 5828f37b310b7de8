use npu_classify_core::BackendError;
use thiserror::Error;

/// Error types for the ONNX backend
#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid normalization: {0}")]
    Normalization(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::Error),
}

impl From<ndarray::ShapeError> for OnnxError {
    fn from(err: ndarray::ShapeError) -> Self {
        OnnxError::Shape(err.to_string())
    }
}

impl From<OnnxError> for BackendError {
    fn from(err: OnnxError) -> Self {
        match err {
            OnnxError::Shape(msg) | OnnxError::Normalization(msg) => BackendError::Tensor(msg),
            other => BackendError::Internal(other.to_string()),
        }
    }
}
