//! Network lifecycle controller
//!
//! Commands from the configuration channel drive each network through
//! creation, tensor binding, load, run and unload. The same controller
//! receives frames (see [`crate::pipeline`]); one mutex guards the registry,
//! the bindings and the run state for every command and every frame.

use crate::attributes::{AttributeRecord, AttributeStore, MemoryAttributeStore};
use crate::backend::NetworkFactory;
use crate::command::{parse_index, Command, CommandOutput};
use crate::config::ClassifierConfig;
use crate::error::ConfigError;
use crate::pipeline::FrameOutcome;
use crate::publisher::{ResultPublisher, TracingPublisher};
use crate::registry::NetworkRegistry;
use crate::resize::{FrameResizer, ImageResizer};
use crate::tensor::TensorInfo;
use crate::tensor_names::split_names;
use npu_classify_common::{ClassifyError, RawFrame, Result, TensorKind};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Model name and tensor names of the active network once it is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModelConfig {
    pub model_name: String,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
}

/// Mutable controller state, guarded by [`Classifier`]'s mutex
pub(crate) struct ClassifierState {
    pub(crate) config: ClassifierConfig,
    pub(crate) factory: Box<dyn NetworkFactory>,
    pub(crate) registry: NetworkRegistry,
    /// Network targeted by commands without `model_name`
    pub(crate) active_model: Option<String>,
    /// Gates frame processing
    pub(crate) run_enabled: bool,
    pub(crate) attributes: AttributeRecord,
    pub(crate) store: Box<dyn AttributeStore>,
    pub(crate) resizer: Box<dyn FrameResizer>,
    pub(crate) publisher: Box<dyn ResultPublisher>,
    /// Validity of the most recent reduction
    pub(crate) last_result_valid: bool,
    pub(crate) last_pts_ms: Option<u64>,
}

/// Lifecycle controller and frame entry point
pub struct Classifier {
    state: Mutex<ClassifierState>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Classifier")
            .field("networks", &state.registry.names())
            .field("active_model", &state.active_model)
            .field("run_enabled", &state.run_enabled)
            .finish()
    }
}

/// Builder for [`Classifier`]
pub struct ClassifierBuilder {
    config: ClassifierConfig,
    factory: Box<dyn NetworkFactory>,
    publisher: Option<Box<dyn ResultPublisher>>,
    resizer: Option<Box<dyn FrameResizer>>,
    store: Option<Box<dyn AttributeStore>>,
}

impl ClassifierBuilder {
    pub fn config(mut self, config: ClassifierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn publisher(mut self, publisher: impl ResultPublisher + 'static) -> Self {
        self.publisher = Some(Box::new(publisher));
        self
    }

    pub fn resizer(mut self, resizer: impl FrameResizer + 'static) -> Self {
        self.resizer = Some(Box::new(resizer));
        self
    }

    pub fn attribute_store(mut self, store: impl AttributeStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Validate the configuration and read the persisted attributes
    pub fn build(self) -> std::result::Result<Classifier, ConfigError> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Box::new(MemoryAttributeStore::new()));
        let attributes = match store.load() {
            Ok(Some(record)) => {
                info!("Loaded persisted attributes (model: {:?})", record.model_name);
                record
            }
            Ok(None) => AttributeRecord::default(),
            Err(e) => {
                warn!("Ignoring persisted attributes: {}", e);
                AttributeRecord::default()
            }
        };

        info!(
            "Classifier ready (model_dir: {}, channel: {})",
            self.config.model_dir.display(),
            self.config.channel
        );

        Ok(Classifier {
            state: Mutex::new(ClassifierState {
                config: self.config,
                factory: self.factory,
                registry: NetworkRegistry::new(),
                active_model: None,
                run_enabled: false,
                attributes,
                store,
                resizer: self
                    .resizer
                    .unwrap_or_else(|| Box::new(ImageResizer::default())),
                publisher: self
                    .publisher
                    .unwrap_or_else(|| Box::new(TracingPublisher)),
                last_result_valid: true,
                last_pts_ms: None,
            }),
        })
    }
}

impl Classifier {
    /// Start building a classifier around a network factory
    pub fn builder(factory: impl NetworkFactory + 'static) -> ClassifierBuilder {
        ClassifierBuilder {
            config: ClassifierConfig::default(),
            factory: Box::new(factory),
            publisher: None,
            resizer: None,
            store: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClassifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute one lifecycle command
    pub fn execute(&self, command: Command) -> Result<CommandOutput> {
        debug!("Executing {}", command.mode());
        self.lock().execute(command)
    }

    /// Decode and execute a JSON request, reporting only success or failure
    pub fn handle_request(&self, body: &str) -> bool {
        match Command::parse(body).and_then(|command| self.execute(command)) {
            Ok(_) => true,
            Err(e) => {
                error!("Configuration request failed: {}", e);
                false
            }
        }
    }

    /// Process one delivered frame
    ///
    /// `None` stands for a frame event without an image. The frame is
    /// released exactly once before this returns.
    pub fn on_frame(&self, frame: Option<RawFrame>) -> FrameOutcome {
        self.lock().process_frame(frame)
    }

    /// Whether frames are currently classified
    pub fn is_running(&self) -> bool {
        self.lock().run_enabled
    }

    /// Registered network names in insertion order
    pub fn network_names(&self) -> Vec<String> {
        self.lock().registry.names()
    }

    pub fn active_model(&self) -> Option<String> {
        self.lock().active_model.clone()
    }

    /// Configuration of the active network, if it is loaded
    pub fn loaded_model(&self) -> Option<LoadedModelConfig> {
        let state = self.lock();
        let entry = state.registry.get(state.active_model.as_deref()?)?;
        if !entry.is_loaded() {
            return None;
        }
        Some(LoadedModelConfig {
            model_name: entry.name().to_string(),
            input_names: entry.bindings().inputs.iter().map(str::to_string).collect(),
            output_names: entry.bindings().outputs.iter().map(str::to_string).collect(),
        })
    }

    pub fn last_result_valid(&self) -> bool {
        self.lock().last_result_valid
    }

    /// Presentation timestamp of the last classified frame
    pub fn last_pts_ms(&self) -> Option<u64> {
        self.lock().last_pts_ms
    }

    /// Current attribute values, as last persisted
    pub fn attributes(&self) -> AttributeRecord {
        self.lock().attributes.clone()
    }

    /// Unload every network and stop classifying
    pub fn finalize(&self) {
        self.lock().shutdown();
    }
}

impl Drop for Classifier {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .shutdown();
    }
}

impl ClassifierState {
    fn execute(&mut self, command: Command) -> Result<CommandOutput> {
        match command {
            Command::CreateNetwork { model_name } => self.create_network(model_name),
            Command::CreateTensor {
                model_name,
                kind,
                names,
            } => self.create_tensor(model_name.as_deref(), kind, names),
            Command::LoadNetwork { model_name } => self.load_network(model_name.as_deref()),
            Command::RunNetwork { model_name } => self.run_network(model_name.as_deref()),
            Command::CheckResult { model_name } => self.check_result(model_name.as_deref()),
            Command::UnloadNetwork { model_name } => self.unload_network(model_name.as_deref()),
            Command::GetTensorByName {
                model_name,
                kind,
                name,
            } => self.tensor_by_name(model_name.as_deref(), kind, name),
            Command::GetTensorByIndex {
                model_name,
                kind,
                index,
            } => self.tensor_by_index(model_name.as_deref(), kind, index),
            Command::ListTensors { model_name, kind } => {
                self.list_tensors(model_name.as_deref(), kind)
            }
            Command::CountTensors { model_name, kind } => {
                self.count_tensors(model_name.as_deref(), kind)
            }
        }
    }

    /// Explicit model name, else the active one
    fn target(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.active_model.clone())
            .ok_or_else(|| ClassifyError::UnknownNetwork("(no active network)".to_string()))
    }

    fn persist(&mut self) {
        if let Err(e) = self
            .store
            .save(&self.config.attribute_version, &self.attributes)
        {
            warn!("Failed to persist attributes: {}", e);
        }
    }

    fn create_network(&mut self, model_name: Option<String>) -> Result<CommandOutput> {
        let name = match model_name {
            Some(name) => name,
            None if !self.attributes.model_name.is_empty() => self.attributes.model_name.clone(),
            None => {
                return Err(ClassifyError::ParseError(
                    "model_name is empty and none is persisted".to_string(),
                ))
            }
        };

        if self.registry.contains(&name) {
            return Err(ClassifyError::AlreadyExists(name));
        }

        let network = self
            .factory
            .create(&name)
            .map_err(|e| ClassifyError::NetworkCreationFailed {
                model: name.clone(),
                reason: e.to_string(),
            })?;
        self.registry.insert(&name, network)?;

        info!("Network created: {}", name);
        self.last_result_valid = true;
        self.active_model = Some(name.clone());
        self.attributes.model_name = name;
        self.persist();
        Ok(CommandOutput::Done)
    }

    fn create_tensor(
        &mut self,
        model_name: Option<&str>,
        kind: TensorKind,
        names: Option<String>,
    ) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let names = names.unwrap_or_else(|| self.attributes.tensor_names(kind).to_string());

        let entry = self.registry.require_mut(&target)?;
        if split_names(&names).next().is_none() {
            return Err(ClassifyError::ParseError(format!(
                "no {} names given for {}",
                kind.field_name(),
                target
            )));
        }

        let (network, bindings) = entry.parts_mut();
        let set = bindings.get_mut(kind);
        for name in split_names(&names) {
            if !set.insert(name) {
                warn!("{} tensor {} is already bound to {}", kind, name, target);
                continue;
            }
            if let Err(e) = network.create_tensor(kind, name) {
                set.remove(name);
                return Err(ClassifyError::TensorCreationFailed {
                    kind,
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
            debug!("Created {} tensor {} on {}", kind, name, target);
        }

        let joined = set.joined();
        info!("{} tensors of {}: {}", kind, target, joined);
        self.attributes.set_tensor_names(kind, joined);
        self.persist();
        Ok(CommandOutput::Done)
    }

    fn load_network(&mut self, model_name: Option<&str>) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let path = self.config.model_path(&target);

        let entry = self.registry.require_mut(&target)?;
        if !entry.bindings().is_bound() {
            return Err(ClassifyError::Unbound(target));
        }
        if entry.is_loaded() {
            return Err(ClassifyError::AlreadyLoaded(target));
        }

        entry
            .network_mut()
            .load(&path, &self.config.mean, &self.config.scale)
            .map_err(|e| ClassifyError::LoadFailed {
                model: target.clone(),
                reason: e.to_string(),
            })?;
        entry.set_loaded(true);

        info!("Network loaded: {} ({})", target, path.display());
        Ok(CommandOutput::Done)
    }

    fn run_network(&mut self, model_name: Option<&str>) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let entry = self.registry.require(&target)?;
        if !entry.bindings().is_bound() {
            return Err(ClassifyError::Unbound(target));
        }

        self.run_enabled = true;
        info!("Inference enabled: {}", target);
        Ok(CommandOutput::Done)
    }

    fn check_result(&self, model_name: Option<&str>) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        self.registry.require(&target)?;

        if self.last_result_valid {
            Ok(CommandOutput::Done)
        } else {
            Err(ClassifyError::InvalidClassification(format!(
                "last result of {} has a likelihood outside [0, 1]",
                target
            )))
        }
    }

    fn unload_network(&mut self, model_name: Option<&str>) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let mut entry = self
            .registry
            .remove(&target)
            .ok_or_else(|| ClassifyError::UnknownNetwork(target.clone()))?;

        entry.network_mut().unload();
        if self.active_model.as_deref() == Some(target.as_str()) {
            self.active_model = None;
        }
        self.run_enabled = false;
        self.last_result_valid = true;

        info!("Network unloaded: {}", target);
        Ok(CommandOutput::Done)
    }

    fn tensor_by_name(
        &mut self,
        model_name: Option<&str>,
        kind: TensorKind,
        name: Option<String>,
    ) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let name = name.unwrap_or_else(|| self.attributes.lookup_name(kind).to_string());

        let entry = self.registry.require(&target)?;
        let info = entry
            .bindings()
            .get(kind)
            .contains(&name)
            .then(|| entry.network().tensor_by_name(kind, &name))
            .flatten()
            .map(|t| t.info())
            .ok_or_else(|| ClassifyError::TensorNotFound(format!("{} tensor {:?}", kind, name)))?;

        info!("{} tensor {} of {}: shape {:?}", kind, info.name, target, info.shape);
        self.attributes.set_lookup_name(kind, name);
        self.persist();
        Ok(CommandOutput::Tensor(info))
    }

    fn tensor_by_index(
        &mut self,
        model_name: Option<&str>,
        kind: TensorKind,
        index: Option<usize>,
    ) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let index = match index {
            Some(index) => index,
            None => parse_index(self.attributes.lookup_index(kind))?,
        };

        let entry = self.registry.require(&target)?;
        let info = (index < entry.bindings().get(kind).len())
            .then(|| entry.network().tensor(kind, index))
            .flatten()
            .map(|t| t.info())
            .ok_or_else(|| ClassifyError::TensorNotFound(format!("{} tensor #{}", kind, index)))?;

        info!("{} tensor #{} of {}: {}", kind, index, target, info.name);
        self.attributes.set_lookup_index(kind, index);
        self.persist();
        Ok(CommandOutput::Tensor(info))
    }

    fn list_tensors(&self, model_name: Option<&str>, kind: TensorKind) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let network = self.registry.require(&target)?.network();

        let tensors: Vec<TensorInfo> = (0..network.tensor_count(kind))
            .filter_map(|i| network.tensor(kind, i))
            .map(|t| t.info())
            .collect();
        for (i, t) in tensors.iter().enumerate() {
            info!("{} tensor #{} of {}: {} {:?}", kind, i, target, t.name, t.shape);
        }
        Ok(CommandOutput::Tensors(tensors))
    }

    fn count_tensors(&self, model_name: Option<&str>, kind: TensorKind) -> Result<CommandOutput> {
        let target = self.target(model_name)?;
        let count = self.registry.require(&target)?.network().tensor_count(kind);
        info!("{} has {} {} tensors", target, count, kind);
        Ok(CommandOutput::Count(count))
    }

    /// Unload and drop every network
    fn shutdown(&mut self) {
        for mut entry in self.registry.drain() {
            entry.network_mut().unload();
            debug!("Network released: {}", entry.name());
        }
        self.active_model = None;
        self.run_enabled = false;
    }
}
