//! Persisted classifier attributes
//!
//! The last-used model name, tensor names and lookup keys survive restarts in
//! a small versioned JSON document:
//!
//! ```json
//! {
//!   "Version": "1.0",
//!   "Attributes": [
//!     { "model_name": "mobilenet_v2", "input_tensor_names": "input", ... }
//!   ]
//! }
//! ```
//!
//! Empty command fields fall back to these values.

use crate::error::AttributeError;
use npu_classify_common::TensorKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Persisted configuration values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRecord {
    pub model_name: String,
    pub input_tensor_names: String,
    pub output_tensor_names: String,
    /// Last name looked up with `get_input_tensor_name`
    pub get_index_input_name: String,
    /// Last name looked up with `get_output_tensor_name`
    pub get_index_output_name: String,
    /// Last index looked up with `get_input_tensor_index`
    pub get_name_input_index: String,
    /// Last index looked up with `get_output_tensor_index`
    pub get_name_output_index: String,
}

impl AttributeRecord {
    /// Comma-joined tensor names of one kind
    pub fn tensor_names(&self, kind: TensorKind) -> &str {
        match kind {
            TensorKind::Input => &self.input_tensor_names,
            TensorKind::Output => &self.output_tensor_names,
        }
    }

    pub fn set_tensor_names(&mut self, kind: TensorKind, names: String) {
        match kind {
            TensorKind::Input => self.input_tensor_names = names,
            TensorKind::Output => self.output_tensor_names = names,
        }
    }

    /// Name last used for a by-name lookup
    pub fn lookup_name(&self, kind: TensorKind) -> &str {
        match kind {
            TensorKind::Input => &self.get_index_input_name,
            TensorKind::Output => &self.get_index_output_name,
        }
    }

    pub fn set_lookup_name(&mut self, kind: TensorKind, name: String) {
        match kind {
            TensorKind::Input => self.get_index_input_name = name,
            TensorKind::Output => self.get_index_output_name = name,
        }
    }

    /// Index last used for a by-index lookup, as stored
    pub fn lookup_index(&self, kind: TensorKind) -> &str {
        match kind {
            TensorKind::Input => &self.get_name_input_index,
            TensorKind::Output => &self.get_name_output_index,
        }
    }

    pub fn set_lookup_index(&mut self, kind: TensorKind, index: usize) {
        let value = index.to_string();
        match kind {
            TensorKind::Input => self.get_name_input_index = value,
            TensorKind::Output => self.get_name_output_index = value,
        }
    }
}

/// On-disk document
#[derive(Debug, Serialize, Deserialize)]
struct AttributeFile {
    #[serde(rename = "Version", default)]
    version: String,
    #[serde(rename = "Attributes")]
    attributes: Option<Vec<AttributeRecord>>,
}

/// Persistence for [`AttributeRecord`]
pub trait AttributeStore: Send {
    /// Read the stored record; `Ok(None)` when nothing was stored yet
    fn load(&self) -> Result<Option<AttributeRecord>, AttributeError>;

    /// Replace the stored record
    fn save(&mut self, version: &str, record: &AttributeRecord) -> Result<(), AttributeError>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonFileAttributeStore {
    path: PathBuf,
}

impl JsonFileAttributeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AttributeStore for JsonFileAttributeStore {
    fn load(&self) -> Result<Option<AttributeRecord>, AttributeError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No attribute file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let file: AttributeFile = serde_json::from_str(&contents)?;
        let attributes = file
            .attributes
            .ok_or_else(|| AttributeError::MissingAttributes(self.path.display().to_string()))?;

        // Later entries override earlier ones
        Ok(attributes.into_iter().last())
    }

    fn save(&mut self, version: &str, record: &AttributeRecord) -> Result<(), AttributeError> {
        let file = AttributeFile {
            version: version.to_string(),
            attributes: Some(vec![record.clone()]),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)?;
        debug!("Attributes saved to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store; clones share the stored record
#[derive(Debug, Clone, Default)]
pub struct MemoryAttributeStore {
    record: Arc<Mutex<Option<AttributeRecord>>>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a record
    pub fn with_record(record: AttributeRecord) -> Self {
        Self {
            record: Arc::new(Mutex::new(Some(record))),
        }
    }

    pub fn record(&self) -> Option<AttributeRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn load(&self) -> Result<Option<AttributeRecord>, AttributeError> {
        Ok(self.record())
    }

    fn save(&mut self, _version: &str, record: &AttributeRecord) -> Result<(), AttributeError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> AttributeRecord {
        AttributeRecord {
            model_name: "mobilenet_v2".into(),
            input_tensor_names: "input".into(),
            output_tensor_names: "prob".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileAttributeStore::new(dir.path().join("attributes.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileAttributeStore::new(dir.path().join("attributes.json"));

        store.save("1.0", &sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["Version"], "1.0");
        assert_eq!(raw["Attributes"][0]["model_name"], "mobilenet_v2");
    }

    #[test]
    fn test_save_truncates() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileAttributeStore::new(dir.path().join("attributes.json"));

        let mut long = sample();
        long.output_tensor_names = "a".repeat(512);
        store.save("1.0", &long).unwrap();
        store.save("1.0", &sample()).unwrap();

        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn test_last_entry_wins_and_fields_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attributes.json");
        std::fs::write(
            &path,
            r#"{"Version":"1.0","Attributes":[{"model_name":"a"},{"model_name":"b","input_tensor_names":"x"}]}"#,
        )
        .unwrap();

        let record = JsonFileAttributeStore::new(&path).load().unwrap().unwrap();
        assert_eq!(record.model_name, "b");
        assert_eq!(record.tensor_names(TensorKind::Input), "x");
        assert_eq!(record.tensor_names(TensorKind::Output), "");
    }

    #[test]
    fn test_missing_attributes_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attributes.json");
        std::fs::write(&path, r#"{"Version":"1.0"}"#).unwrap();

        let err = JsonFileAttributeStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AttributeError::MissingAttributes(_)));

        std::fs::write(&path, "not json").unwrap();
        let err = JsonFileAttributeStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AttributeError::Parse(_)));
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryAttributeStore::new();
        let mut writer = store.clone();
        assert_eq!(store.load().unwrap(), None);

        writer.save("1.0", &sample()).unwrap();
        assert_eq!(store.record(), Some(sample()));
    }

    #[test]
    fn test_record_accessors() {
        let mut record = AttributeRecord::default();
        record.set_tensor_names(TensorKind::Output, "out0,out1".into());
        record.set_lookup_name(TensorKind::Input, "in0".into());
        record.set_lookup_index(TensorKind::Output, 3);

        assert_eq!(record.output_tensor_names, "out0,out1");
        assert_eq!(record.lookup_name(TensorKind::Input), "in0");
        assert_eq!(record.lookup_index(TensorKind::Output), "3");
        assert_eq!(record.lookup_index(TensorKind::Input), "");
    }
}
