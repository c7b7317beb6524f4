//! Analysis configuration loaded from TOML.
//!
//! ```toml
//! model = "two_way_mixed"
//! confidence_level = 0.9
//! null_values = [0.0, 0.5, 0.7]
//! reliability = "inter_rater"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IccError, Result};
use crate::model::{
    IccModel, Reliability, DEFAULT_CONFIDENCE_LEVEL, DEFAULT_NULL_VALUES, UNIT_NULL_TOLERANCE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub model: IccModel,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default = "default_null_values")]
    pub null_values: Vec<f64>,
    /// Coefficient to report intervals and p-values for; the model's primary
    /// coefficient when absent.
    #[serde(default)]
    pub reliability: Option<Reliability>,
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

fn default_null_values() -> Vec<f64> {
    DEFAULT_NULL_VALUES.to_vec()
}

impl AnalysisConfig {
    pub fn new(model: IccModel) -> Self {
        Self {
            model,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            null_values: default_null_values(),
            reliability: None,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| IccError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            IccError::config(format!(
                "failed to read config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(IccError::config(format!(
                "confidence_level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.null_values.is_empty() {
            return Err(IccError::config("null_values must not be empty"));
        }
        let range = -UNIT_NULL_TOLERANCE..=1.0 + UNIT_NULL_TOLERANCE;
        if let Some(bad) = self.null_values.iter().find(|v| !range.contains(*v)) {
            return Err(IccError::config(format!(
                "null_values must lie in [0, 1], got {bad}"
            )));
        }
        Ok(())
    }

    /// Requested coefficient, falling back to the model's primary one.
    pub fn reliability(&self) -> Reliability {
        self.reliability
            .unwrap_or_else(|| self.model.primary_reliability())
    }
}
