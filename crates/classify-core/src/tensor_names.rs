//! Ordered, de-duplicated tensor name sets

use npu_classify_common::TensorKind;

/// Split a comma-separated name list, trimming whitespace and skipping empties
pub fn split_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Tensor names registered for one side of a network, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorNameSet {
    names: Vec<String>,
}

impl TensorNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name; returns `false` when it was already present
    pub fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Remove a name; returns `true` when it was present
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|n| n != name);
        self.names.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Comma-joined form, as persisted
    pub fn joined(&self) -> String {
        self.names.join(",")
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Input and output name sets bound to one network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TensorBindings {
    pub inputs: TensorNameSet,
    pub outputs: TensorNameSet,
}

impl TensorBindings {
    pub fn get(&self, kind: TensorKind) -> &TensorNameSet {
        match kind {
            TensorKind::Input => &self.inputs,
            TensorKind::Output => &self.outputs,
        }
    }

    pub fn get_mut(&mut self, kind: TensorKind) -> &mut TensorNameSet {
        match kind {
            TensorKind::Input => &mut self.inputs,
            TensorKind::Output => &mut self.outputs,
        }
    }

    /// Both sides have at least one tensor
    pub fn is_bound(&self) -> bool {
        !self.inputs.is_empty() && !self.outputs.is_empty()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }
}
