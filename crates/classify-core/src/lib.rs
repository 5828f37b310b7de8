//! NPU Classify Core - command-driven network lifecycle and frame classification
//!
//! This crate provides the lifecycle controller that creates, binds, loads,
//! runs and unloads named neural networks, and the per-frame pipeline that
//! selects a plane, feeds each network and reduces its scores to a top-K
//! classification published as metadata.
//!
//! Backends plug in through [`NeuralNetwork`] and [`NetworkFactory`].

pub mod attributes;
pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame_selector;
pub mod pipeline;
pub mod publisher;
pub mod registry;
pub mod resize;
pub mod tensor;
pub mod tensor_names;
pub mod topk;

pub use attributes::{AttributeRecord, AttributeStore, JsonFileAttributeStore, MemoryAttributeStore};
pub use backend::{ExecutionStats, NetworkFactory, NeuralNetwork};
pub use command::{Command, CommandOutput};
pub use config::{ClassifierConfig, InvalidResultPolicy};
pub use controller::{Classifier, ClassifierBuilder, LoadedModelConfig};
pub use error::{AttributeError, BackendError, ConfigError, PublishError, ResizeError};
pub use frame_selector::{select_plane, PlaneLimits};
pub use pipeline::{FrameOutcome, SkipReason};
pub use publisher::{
    format_timestamp, ClassificationPayload, CollectingPublisher, MetadataRecord, ResultPublisher,
    TracingPublisher,
};
pub use registry::{NetworkEntry, NetworkRegistry};
pub use resize::{FrameResizer, ImageResizer, ImageSize};
pub use tensor::{HostTensor, Tensor, TensorInfo};
pub use tensor_names::{TensorBindings, TensorNameSet};
pub use topk::{ClassScore, Classification, TopK, TOP_K};

pub use npu_classify_common::{
    ClassifyError, ImagePlane, PixelFormat, RawFrame, Result, TensorKind,
};
