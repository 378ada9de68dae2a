use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::negative_iv::DEFAULT_STEP_SIZE;

/// Run configuration for the sorter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Percentile grid step of the probability integration
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Key holding the parameter list inside each input model payload.
    /// `None` when the payload is the list itself.
    #[serde(default = "default_model_key")]
    pub model_key: Option<String>,

    /// Name of the output model in the result document
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Overrides `Settings.ApplySmoothing` when set
    #[serde(default)]
    pub apply_smoothing: Option<bool>,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            step_size: default_step_size(),
            model_key: default_model_key(),
            output_name: default_output_name(),
            apply_smoothing: None,
        }
    }
}

impl SorterConfig {
    /// Production settings: 99-point percentile grid
    pub fn standard() -> Self {
        Self::default()
    }

    /// 999-point percentile grid for convergence checks
    pub fn fine() -> Self {
        Self {
            step_size: 0.001,
            ..Self::default()
        }
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_smoothing(mut self, apply: bool) -> Self {
        self.apply_smoothing = Some(apply);
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid sorter configuration")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in config file {}", path.display()))
    }
}

fn default_step_size() -> f64 {
    DEFAULT_STEP_SIZE
}

fn default_model_key() -> Option<String> {
    Some("model".to_string())
}

fn default_output_name() -> String {
    "Output".to_string()
}
