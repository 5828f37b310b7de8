#![allow(dead_code)]

use npu_classify_core::{
    BackendError, Classifier, CollectingPublisher, ExecutionStats, FrameResizer, HostTensor,
    ImagePlane, ImageResizer, ImageSize, MemoryAttributeStore, NetworkFactory, NeuralNetwork,
    PixelFormat, RawFrame, ResizeError, Tensor,
};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Call counters shared between a test and the fakes it installs
#[derive(Debug, Default)]
pub struct Probe {
    pub created: AtomicUsize,
    pub loads: AtomicUsize,
    pub runs: AtomicUsize,
    pub unloads: AtomicUsize,
    pub allocations: AtomicUsize,
    pub resizes: AtomicUsize,
    pub load_paths: Mutex<Vec<PathBuf>>,
}

impl Probe {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn stage_calls(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
            + self.resizes.load(Ordering::SeqCst)
            + self.runs.load(Ordering::SeqCst)
    }
}

/// How fake networks behave
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    pub input_size: (usize, usize),
    pub scores: Vec<f32>,
    pub fail_load: bool,
    pub fail_run: bool,
    pub reject_tensor: Option<String>,
    /// Backend-owned outputs materialized alongside each bound output
    pub extra_outputs: usize,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            input_size: (8, 8),
            scores: vec![0.1, 0.9, 0.05, 0.95, 0.5, 0.2],
            fail_load: false,
            fail_run: false,
            reject_tensor: None,
            extra_outputs: 0,
        }
    }
}

pub struct FakeNetwork {
    behavior: FakeBehavior,
    probe: Arc<Probe>,
    inputs: Vec<HostTensor>,
    outputs: Vec<HostTensor>,
    loaded: bool,
}

impl NeuralNetwork for FakeNetwork {
    fn create_input_tensor(&mut self, name: &str) -> Result<(), BackendError> {
        if self.behavior.reject_tensor.as_deref() == Some(name) {
            return Err(BackendError::Tensor(format!("cannot allocate {name}")));
        }
        let (w, h) = self.behavior.input_size;
        self.inputs.push(HostTensor::zeros(name, &[w, h, 3]));
        Ok(())
    }

    fn create_output_tensor(&mut self, name: &str) -> Result<(), BackendError> {
        if self.behavior.reject_tensor.as_deref() == Some(name) {
            return Err(BackendError::Tensor(format!("cannot allocate {name}")));
        }
        self.outputs.push(HostTensor::unallocated(name));
        for i in 0..self.behavior.extra_outputs {
            self.outputs.push(HostTensor::unallocated(format!("{name}_aux{i}")));
        }
        Ok(())
    }

    fn load(&mut self, model_path: &Path, _mean: &[f32], _scale: &[f32]) -> Result<(), BackendError> {
        self.probe.loads.fetch_add(1, Ordering::SeqCst);
        self.probe
            .load_paths
            .lock()
            .unwrap()
            .push(model_path.to_path_buf());
        if self.behavior.fail_load {
            return Err(BackendError::ModelNotFound(model_path.display().to_string()));
        }
        self.loaded = true;
        Ok(())
    }

    fn run(&mut self) -> Result<ExecutionStats, BackendError> {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_run {
            return Err(BackendError::Internal("device lost".into()));
        }
        if !self.loaded {
            return Err(BackendError::NotLoaded);
        }
        let scores = &self.behavior.scores;
        for output in &mut self.outputs {
            output
                .set_values(&[scores.len()], scores.clone())
                .map_err(|e| BackendError::Tensor(e.to_string()))?;
        }
        Ok(ExecutionStats::default())
    }

    fn unload(&mut self) {
        self.probe.unloads.fetch_add(1, Ordering::SeqCst);
        self.loaded = false;
        self.inputs.clear();
        self.outputs.clear();
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

pub struct FakeFactory {
    pub behavior: FakeBehavior,
    pub probe: Arc<Probe>,
    pub fail: bool,
}

impl NetworkFactory for FakeFactory {
    fn create(&self, model_name: &str) -> Result<Box<dyn NeuralNetwork>, BackendError> {
        if self.fail {
            return Err(BackendError::Internal(format!("no device for {model_name}")));
        }
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeNetwork {
            behavior: self.behavior.clone(),
            probe: Arc::clone(&self.probe),
            inputs: Vec::new(),
            outputs: Vec::new(),
            loaded: false,
        }))
    }
}

/// Image resizer that counts its calls
pub struct CountingResizer {
    inner: ImageResizer,
    probe: Arc<Probe>,
}

impl FrameResizer for CountingResizer {
    fn allocate(&mut self, plane: &ImagePlane) -> Result<RgbImage, ResizeError> {
        self.probe.allocations.fetch_add(1, Ordering::SeqCst);
        self.inner.allocate(plane)
    }

    fn resize(
        &mut self,
        image: &RgbImage,
        target: &mut dyn Tensor,
        size: ImageSize,
    ) -> Result<(), ResizeError> {
        self.probe.resizes.fetch_add(1, Ordering::SeqCst);
        self.inner.resize(image, target, size)
    }
}

pub struct Harness {
    pub classifier: Classifier,
    pub probe: Arc<Probe>,
    pub published: CollectingPublisher,
    pub store: MemoryAttributeStore,
}

pub fn harness(behavior: FakeBehavior) -> Harness {
    harness_with_store(behavior, MemoryAttributeStore::new())
}

/// Route controller logs to the test output; RUST_LOG selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn harness_with_store(behavior: FakeBehavior, store: MemoryAttributeStore) -> Harness {
    init_tracing();
    let probe = Arc::new(Probe::default());
    let published = CollectingPublisher::new();

    let classifier = Classifier::builder(FakeFactory {
        behavior,
        probe: Arc::clone(&probe),
        fail: false,
    })
    .publisher(published.clone())
    .resizer(CountingResizer {
        inner: ImageResizer::default(),
        probe: Arc::clone(&probe),
    })
    .attribute_store(store.clone())
    .build()
    .unwrap();

    Harness {
        classifier,
        probe,
        published,
        store,
    }
}

/// Send one JSON request
pub fn request(classifier: &Classifier, mode: &str, fields: &[(&str, &str)]) -> bool {
    let mut doc = serde_json::Map::new();
    doc.insert("mode".into(), mode.into());
    for (key, value) in fields {
        doc.insert((*key).into(), (*value).into());
    }
    classifier.handle_request(&serde_json::Value::Object(doc).to_string())
}

/// create -> bind -> load -> run
pub fn bring_up(classifier: &Classifier, model: &str) {
    assert!(request(classifier, "create_network", &[("model_name", model)]));
    assert!(request(classifier, "create_input_tensor", &[("model_name", model), ("input_tensor", "input")]));
    assert!(request(classifier, "create_output_tensor", &[("model_name", model), ("output_tensor", "prob")]));
    assert!(request(classifier, "load_network", &[("model_name", model)]));
    assert!(request(classifier, "run_network", &[("model_name", model)]));
}

pub fn rgb_frame(pts_ms: u64, width: u32, height: u32) -> RawFrame {
    let data = vec![127u8; (width * height * 3) as usize];
    RawFrame::new(pts_ms, vec![ImagePlane::new(width, height, PixelFormat::Rgb24, data)])
}

/// Frame whose release hook bumps the returned counter
pub fn tracked_frame(pts_ms: u64, planes: Vec<ImagePlane>) -> (RawFrame, Arc<AtomicUsize>) {
    let released = Arc::new(AtomicUsize::new(0));
    let hook = Arc::clone(&released);
    let frame = RawFrame::new(pts_ms, planes).with_release(move || {
        hook.fetch_add(1, Ordering::SeqCst);
    });
    (frame, released)
}
