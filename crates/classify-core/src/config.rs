//! Classifier configuration

use crate::error::ConfigError;
use crate::frame_selector::PlaneLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with a classification that fails the validity check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidResultPolicy {
    /// Publish anyway, flagged as invalid
    #[default]
    Publish,
    /// Do not publish
    Drop,
}

/// Configuration for the lifecycle controller and inference pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Directory holding the model binaries, joined with the model name on load
    pub model_dir: PathBuf,

    /// Per-channel mean subtracted from the RGB input
    pub mean: Vec<f32>,

    /// Per-channel scale applied after mean subtraction
    pub scale: Vec<f32>,

    /// Plane selection ceilings
    pub plane_limits: PlaneLimits,

    /// Metadata channel results are published on
    pub channel: u32,

    /// Publishing policy for results failing the validity check
    pub invalid_results: InvalidResultPolicy,

    /// Version written into the persisted attribute record
    pub attribute_version: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("../res/ai_bin/"),
            mean: vec![123.68, 116.779, 103.939],
            scale: vec![1.0, 1.0, 1.0],
            plane_limits: PlaneLimits::default(),
            channel: 0,
            invalid_results: InvalidResultPolicy::Publish,
            attribute_version: "1.0".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text; missing keys take their defaults
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClassifierConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(ConfigError::Invalid(format!(
                "mean ({}) and scale ({}) must have the same non-zero length",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| *s == 0.0) {
            return Err(ConfigError::Invalid("scale values must be non-zero".into()));
        }
        Ok(())
    }

    /// Deterministic model path for a model name
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.mean, vec![123.68, 116.779, 103.939]);
        assert_eq!(config.scale, vec![1.0, 1.0, 1.0]);
        assert_eq!(config.channel, 0);
        assert_eq!(config.invalid_results, InvalidResultPolicy::Publish);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_path() {
        let config = ClassifierConfig::default();
        assert_eq!(
            config.model_path("mobilenet_v2"),
            PathBuf::from("../res/ai_bin/mobilenet_v2")
        );
    }

    #[test]
    fn test_partial_yaml() {
        let config = ClassifierConfig::from_yaml_str(
            "model_dir: /opt/models\ninvalid_results: drop\nplane_limits:\n  max_dimension: 2048\n",
        )
        .unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.invalid_results, InvalidResultPolicy::Drop);
        assert_eq!(config.plane_limits.max_dimension, 2048);
        assert_eq!(config.plane_limits.multi_plane_max_width, 3840);
        assert_eq!(config.mean.len(), 3);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ClassifierConfig::from_yaml_str("mean: [1.0]\nscale: [1.0, 2.0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ClassifierConfig::from_yaml_str("channel: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
