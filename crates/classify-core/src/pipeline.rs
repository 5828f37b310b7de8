//! Per-frame inference: preprocess, execute, postprocess
//!
//! For every registered network, in insertion order:
//!
//! 1. **Preprocess** - resize the working image into the first input tensor
//! 2. **Execute** - one forward pass
//! 3. **Postprocess** - reduce each output tensor to its top-K classes and
//!    publish the result right away
//!
//! The first stage failure aborts the remaining networks of that frame.

use crate::backend::NeuralNetwork;
use crate::config::InvalidResultPolicy;
use crate::controller::ClassifierState;
use crate::frame_selector::select_plane;
use crate::publisher::{ClassificationPayload, MetadataRecord, ResultPublisher};
use crate::resize::{FrameResizer, ImageSize};
use crate::topk::{self, TopK, TOP_K};
use image::RgbImage;
use npu_classify_common::{ClassifyError, RawFrame};
use tracing::{debug, error, warn};

/// Why a frame was not classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Inference is not enabled
    NotRunning,
    /// The frame event carried no image
    NoImage,
    /// No plane passed selection
    NoUsablePlane,
    /// The working image could not be built from the selected plane
    AllocationFailed,
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    /// Every network ran all three stages
    Processed { networks: usize, published: usize },
    /// A stage failed; networks after `network` were not run
    Aborted {
        network: String,
        error: ClassifyError,
        published: usize,
    },
}

impl FrameOutcome {
    /// Number of records handed to the publisher
    pub fn published(&self) -> usize {
        match self {
            FrameOutcome::Skipped(_) => 0,
            FrameOutcome::Processed { published, .. } | FrameOutcome::Aborted { published, .. } => {
                *published
            }
        }
    }
}

/// Publishing side of postprocessing for one frame
struct ResultSink<'a> {
    publisher: &'a mut dyn ResultPublisher,
    channel: u32,
    policy: InvalidResultPolicy,
    pts_ms: u64,
    last_valid: &'a mut bool,
    published: usize,
}

impl ResultSink<'_> {
    fn submit(&mut self, model: &str, tensor: &str, top: &TopK<TOP_K>) {
        let valid = top.is_valid();
        *self.last_valid = valid;

        if let Some(slot) = top.first_invalid() {
            warn!(
                "{}/{}: likelihood {} of class {} is outside [0, 1]",
                model, tensor, slot.probability, slot.class_id
            );
            if self.policy == InvalidResultPolicy::Drop {
                return;
            }
        }

        let payload = ClassificationPayload::new(model, tensor, top.to_classification(), self.pts_ms);
        let result = MetadataRecord::from_payload(self.channel, &payload)
            .and_then(|record| self.publisher.publish(record));
        match result {
            Ok(()) => self.published += 1,
            Err(e) => warn!("Failed to publish result of {}/{}: {}", model, tensor, e),
        }
    }
}

impl ClassifierState {
    pub(crate) fn process_frame(&mut self, frame: Option<RawFrame>) -> FrameOutcome {
        if !self.run_enabled {
            if let Some(frame) = frame {
                frame.release();
            }
            return FrameOutcome::Skipped(SkipReason::NotRunning);
        }

        let Some(frame) = frame else {
            debug!("Frame event without image");
            return FrameOutcome::Skipped(SkipReason::NoImage);
        };

        let outcome = self.classify(&frame);
        frame.release();
        outcome
    }

    fn classify(&mut self, frame: &RawFrame) -> FrameOutcome {
        let ClassifierState {
            config,
            registry,
            resizer,
            publisher,
            last_result_valid,
            last_pts_ms,
            ..
        } = self;

        let Some(plane) = select_plane(frame.planes(), &config.plane_limits) else {
            debug!("No usable plane in frame ({} planes)", frame.planes().len());
            return FrameOutcome::Skipped(SkipReason::NoUsablePlane);
        };

        let image = match resizer.allocate(plane) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to allocate working image: {}", e);
                return FrameOutcome::Skipped(SkipReason::AllocationFailed);
            }
        };

        let pts_ms = frame.pts_ms();
        *last_pts_ms = Some(pts_ms);

        let mut sink = ResultSink {
            publisher: publisher.as_mut(),
            channel: config.channel,
            policy: config.invalid_results,
            pts_ms,
            last_valid: last_result_valid,
            published: 0,
        };

        let mut networks = 0;
        for entry in registry.iter_mut() {
            let name = entry.name().to_string();
            if let Err(e) = run_stages(&name, entry.network_mut(), resizer.as_mut(), &image, &mut sink) {
                error!("Inference failed on network {}: {}", name, e);
                return FrameOutcome::Aborted {
                    network: name,
                    error: e,
                    published: sink.published,
                };
            }
            networks += 1;
        }

        FrameOutcome::Processed {
            networks,
            published: sink.published,
        }
    }
}

fn run_stages(
    name: &str,
    network: &mut dyn NeuralNetwork,
    resizer: &mut dyn FrameResizer,
    image: &RgbImage,
    sink: &mut ResultSink<'_>,
) -> Result<(), ClassifyError> {
    preprocess(network, resizer, image)?;
    execute(name, network)?;
    postprocess(name, network, sink);
    Ok(())
}

fn preprocess(
    network: &mut dyn NeuralNetwork,
    resizer: &mut dyn FrameResizer,
    image: &RgbImage,
) -> Result<(), ClassifyError> {
    let tensor = network
        .input_tensor_mut(0)
        .ok_or_else(|| ClassifyError::TensorNotFound("input tensor #0".to_string()))?;

    let size = ImageSize::of_tensor(&*tensor).map_err(|e| ClassifyError::ResizeFailed(e.to_string()))?;
    resizer
        .resize(image, tensor, size)
        .map_err(|e| ClassifyError::ResizeFailed(e.to_string()))
}

fn execute(name: &str, network: &mut dyn NeuralNetwork) -> Result<(), ClassifyError> {
    let stats = network
        .run()
        .map_err(|e| ClassifyError::ExecutionFailed(e.to_string()))?;
    debug!("{}: forward pass took {:?}", name, stats.duration);
    Ok(())
}

fn postprocess(name: &str, network: &dyn NeuralNetwork, sink: &mut ResultSink<'_>) {
    for index in 0..network.output_tensor_count() {
        let Some(tensor) = network.output_tensor(index) else {
            continue;
        };
        let Some(scores) = tensor.data() else {
            debug!("{}: output tensor {} has no buffer", name, tensor.name());
            continue;
        };

        let width = tensor.dim(0).min(scores.len());
        if width == 0 {
            debug!("{}: no output in tensor {}", name, tensor.name());
            continue;
        }

        let top = topk::reduce::<TOP_K>(&scores[..width]);
        sink.submit(name, tensor.name(), &top);
    }
}
