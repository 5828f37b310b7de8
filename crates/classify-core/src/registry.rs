//! Network registry keyed by model name

use crate::backend::NeuralNetwork;
use crate::tensor_names::TensorBindings;
use npu_classify_common::ClassifyError;
use tracing::{debug, info};

/// A registered network with its tensor bindings
pub struct NetworkEntry {
    name: String,
    network: Box<dyn NeuralNetwork>,
    bindings: TensorBindings,
    loaded: bool,
}

impl NetworkEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> &dyn NeuralNetwork {
        self.network.as_ref()
    }

    pub fn network_mut(&mut self) -> &mut dyn NeuralNetwork {
        self.network.as_mut()
    }

    pub fn bindings(&self) -> &TensorBindings {
        &self.bindings
    }

    /// Whether `load` succeeded and no unload happened since
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Split into the network handle and its bindings for simultaneous mutation
    pub(crate) fn parts_mut(&mut self) -> (&mut dyn NeuralNetwork, &mut TensorBindings) {
        (self.network.as_mut(), &mut self.bindings)
    }
}

impl std::fmt::Debug for NetworkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkEntry")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .field("loaded", &self.loaded)
            .finish()
    }
}

/// Sole owner of all network handles
///
/// A name is present iff the network has been created and not unloaded.
/// Iteration follows insertion order.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    entries: Vec<NetworkEntry>,
}

impl NetworkRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(2), // One active network is the common case
        }
    }

    /// Register a freshly created network
    pub fn insert(
        &mut self,
        name: &str,
        network: Box<dyn NeuralNetwork>,
    ) -> Result<&mut NetworkEntry, ClassifyError> {
        if self.contains(name) {
            return Err(ClassifyError::AlreadyExists(name.to_string()));
        }

        info!("Registering network: {}", name);

        self.entries.push(NetworkEntry {
            name: name.to_string(),
            network,
            bindings: TensorBindings::default(),
            loaded: false,
        });
        let index = self.entries.len() - 1;
        Ok(&mut self.entries[index])
    }

    /// Remove a network, handing ownership back to the caller
    pub fn remove(&mut self, name: &str) -> Option<NetworkEntry> {
        let index = self.entries.iter().position(|e| e.name == name)?;
        debug!("Removing network: {}", name);
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&NetworkEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut NetworkEntry> {
        self.entries.iter_mut().find(|e| e.name == name)
    }

    /// Look up a network or fail with `UnknownNetwork`
    pub fn require(&self, name: &str) -> Result<&NetworkEntry, ClassifyError> {
        self.get(name)
            .ok_or_else(|| ClassifyError::UnknownNetwork(name.to_string()))
    }

    /// Mutable variant of [`NetworkRegistry::require`]
    pub fn require_mut(&mut self, name: &str) -> Result<&mut NetworkEntry, ClassifyError> {
        self.get_mut(name)
            .ok_or_else(|| ClassifyError::UnknownNetwork(name.to_string()))
    }

    /// Registered names in insertion order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NetworkEntry> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every network, in insertion order
    pub fn drain(&mut self) -> impl Iterator<Item = NetworkEntry> + '_ {
        self.entries.drain(..)
    }
}
