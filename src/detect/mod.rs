//! Traffic aggregation and anomaly classification.
//!
//! Raw `(identity, path, timestamp)` events are bucketed into one-minute
//! windows per identity, then judged by a fixed rate threshold and by a
//! trained scoring artifact. Flagged windows become alerts or explanations.

pub mod alert;
pub mod classifier;
pub mod engine;
pub mod explain;
pub mod rule;
pub mod window;

pub use self::engine::{DetectionEngine, ExplainedWindow, Explanation, ModelDetection, WindowVerdict};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ModelError;
use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),
}

/// One observed request. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEvent {
    #[serde(rename = "ip")]
    pub identity: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl TrafficEvent {
    pub fn new(identity: impl Into<String>, path: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            path: path.into(),
            timestamp,
        }
    }
}

/// Request count for one identity within one window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WindowCount {
    #[serde(rename = "ip")]
    pub identity: String,
    pub window_start: DateTime<Utc>,
    pub count: u64,
}

/// A record that a window was judged anomalous. `timestamp` is the creation
/// time, not the window's time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "ip")]
    pub identity: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(identity: impl Into<String>, reason: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity: identity.into(),
            reason: reason.into(),
            timestamp,
        }
    }
}
