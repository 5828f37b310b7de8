//! Error types for the backend, resize, publish and persistence seams

use thiserror::Error;

/// Errors reported by a network backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Backend error: {0}")]
    Internal(String),

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Network is not loaded")]
    NotLoaded,

    #[error("Tensor error: {0}")]
    Tensor(String),
}

/// Errors reported while converting or resizing a frame
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResizeError {
    #[error("Invalid plane: {0}")]
    InvalidPlane(String),

    #[error("Target tensor has no backing buffer: {0}")]
    NoBuffer(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Errors reported by a result publisher
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by the attribute store
#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Attribute file parsing failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Attribute field is not found in {0}")]
    MissingAttributes(String),
}

/// Errors reported while loading the classifier configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
