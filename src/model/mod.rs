//! Scoring artifacts: the narrow `Scorer` seam, artifact loading, and the
//! offline trainer that produces artifacts from stored traffic.

pub mod artifact;
pub mod train;

pub use self::artifact::LogisticArtifact;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse artifact {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
    #[error("no data to train")]
    NoTrainingData,
    #[error("training data contains a single class: every window is {class}")]
    SingleClass { class: &'static str },
}

/// A trained decision function over a window's request count.
pub trait Scorer: Send + Sync {
    fn predict(&self, count: u64) -> bool;
}

impl<F> Scorer for F
where
    F: Fn(u64) -> bool + Send + Sync,
{
    fn predict(&self, count: u64) -> bool {
        self(count)
    }
}

/// Where a detection call obtains its scorer. Loaded once per call and
/// shared read-only for the rest of it.
pub trait ModelSource: Send + Sync {
    fn load(&self) -> Result<Arc<dyn Scorer>, ModelError>;
}

/// Artifact JSON on disk, re-read on every load so a retrained file is
/// picked up without a restart.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    path: PathBuf,
    label_threshold: Option<u64>,
}

impl ArtifactFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            label_threshold: None,
        }
    }

    /// Warn on load when the artifact was labelled with a different rate
    /// threshold than the one detection runs with.
    pub fn with_label_threshold(mut self, threshold: u64) -> Self {
        self.label_threshold = Some(threshold);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelSource for ArtifactFile {
    fn load(&self) -> Result<Arc<dyn Scorer>, ModelError> {
        let artifact = LogisticArtifact::load(&self.path)?;
        if let Some(expected) = self.label_threshold {
            if !artifact.labelled_with(expected) {
                warn!(
                    path = %self.path.display(),
                    trained = artifact.label_threshold,
                    expected,
                    "artifact was trained with a different rate threshold; retrain to match"
                );
            }
        }
        debug!(path = %self.path.display(), version = %artifact.version, "loaded scoring artifact");
        Ok(Arc::new(artifact))
    }
}

/// An already-constructed scorer.
#[derive(Clone)]
pub struct Preloaded(Arc<dyn Scorer>);

impl Preloaded {
    pub fn new(scorer: impl Scorer + 'static) -> Self {
        Self(Arc::new(scorer))
    }
}

impl ModelSource for Preloaded {
    fn load(&self) -> Result<Arc<dyn Scorer>, ModelError> {
        Ok(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_scorer() {
        let source = Preloaded::new(|count: u64| count >= 20);
        let scorer = source.load().unwrap();
        assert!(scorer.predict(20));
        assert!(!scorer.predict(19));
    }

    #[test]
    fn test_threshold_mismatch_still_loads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let samples = [
            train::Sample { count: 3, anomalous: false },
            train::Sample { count: 15, anomalous: true },
        ];
        let artifact = train::fit(&samples, 10, &train::TrainOptions::default()).unwrap();
        artifact.save(&path).unwrap();

        let loaded = LogisticArtifact::load(&path).unwrap();
        assert!(loaded.labelled_with(10));
        assert!(!loaded.labelled_with(25));

        let scorer = ArtifactFile::new(&path).with_label_threshold(25).load().unwrap();
        assert!(scorer.predict(15));
    }

    #[test]
    fn test_missing_artifact_is_io_error() {
        let source = ArtifactFile::new("/nonexistent/sentinelai/model.json");
        match source.load() {
            Err(ModelError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/sentinelai/model.json"))
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing artifact loaded"),
        }
    }
}
