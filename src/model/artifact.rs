use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ModelError, Scorer};

/// The single feature every artifact is fit on.
pub const FEATURE_COUNT: &str = "count";

/// Binary logistic regression over one standardized feature: the request
/// count of a `(identity, minute)` window.
///
/// Labels during training follow `count > label_threshold`; a positive
/// prediction therefore means "anomalous window".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticArtifact {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub mean: f64, // For standardization
    pub std: f64,  // For standardization
    pub weight: f64,
    pub bias: f64,
    pub samples: usize,
    pub label_threshold: u64,
}

impl LogisticArtifact {
    /// Load and validate an artifact from JSON.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self = serde_json::from_str(&content).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Write the artifact as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ModelError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;
        info!(path = %path.display(), version = %self.version, "saved scoring artifact");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.len() != 1 || self.feature_names[0] != FEATURE_COUNT {
            return Err(ModelError::Invalid(format!(
                "expected features [\"{}\"], got {:?}",
                FEATURE_COUNT, self.feature_names
            )));
        }
        if !(self.std.is_finite() && self.std > 0.0) {
            return Err(ModelError::Invalid(format!("std must be positive, got {}", self.std)));
        }
        if !(self.mean.is_finite() && self.weight.is_finite() && self.bias.is_finite()) {
            return Err(ModelError::Invalid("non-finite coefficients".to_string()));
        }
        Ok(())
    }

    /// Whether training labelled windows with `count > threshold`.
    pub fn labelled_with(&self, threshold: u64) -> bool {
        self.label_threshold == threshold
    }

    /// Probability that a window with `count` requests is anomalous.
    pub fn probability(&self, count: u64) -> f64 {
        let z = (count as f64 - self.mean) / self.std;
        sigmoid(self.weight * z + self.bias)
    }
}

impl Scorer for LogisticArtifact {
    fn predict(&self, count: u64) -> bool {
        self.probability(count) >= 0.5
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
