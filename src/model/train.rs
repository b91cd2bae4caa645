//! Offline trainer: fit a `LogisticArtifact` from stored traffic.
//!
//! Features are built exactly the way detection builds them (per identity,
//! per one-minute window) and labelled with the rate rule, so the artifact
//! learns to reproduce `count > threshold` as a smooth decision function.

use chrono::Utc;
use tracing::info;

use super::artifact::{sigmoid, LogisticArtifact, FEATURE_COUNT};
use super::ModelError;
use crate::detect::rule::RuleClassifier;
use crate::detect::{window, DetectError, WindowCount};
use crate::storage::TrafficStore;

/// One labelled training row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub count: u64,
    pub anomalous: bool,
}

/// Gradient descent settings. `c` is the inverse L2 strength.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub learning_rate: f64,
    pub iterations: usize,
    pub c: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            iterations: 2_000,
            c: 1.0,
        }
    }
}

/// Label each window with the rate rule.
pub fn label_windows(windows: &[WindowCount], rule: &RuleClassifier) -> Vec<Sample> {
    windows
        .iter()
        .map(|w| Sample {
            count: w.count,
            anomalous: rule.is_anomalous(w),
        })
        .collect()
}

/// Fit a standardized single-feature logistic regression.
pub fn fit(samples: &[Sample], label_threshold: u64, opts: &TrainOptions) -> Result<LogisticArtifact, ModelError> {
    if samples.is_empty() {
        return Err(ModelError::NoTrainingData);
    }
    let positives = samples.iter().filter(|s| s.anomalous).count();
    if positives == 0 {
        return Err(ModelError::SingleClass { class: "normal" });
    }
    if positives == samples.len() {
        return Err(ModelError::SingleClass { class: "anomalous" });
    }

    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| s.count as f64).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|s| (s.count as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = if variance > 0.0 { variance.sqrt() } else { 1.0 };

    let xs: Vec<(f64, f64)> = samples
        .iter()
        .map(|s| ((s.count as f64 - mean) / std, if s.anomalous { 1.0 } else { 0.0 }))
        .collect();

    let l2 = 1.0 / (opts.c * n);
    let mut weight = 0.0;
    let mut bias = 0.0;
    for _ in 0..opts.iterations {
        let mut grad_w = 0.0;
        let mut grad_b = 0.0;
        for &(z, y) in &xs {
            let err = sigmoid(weight * z + bias) - y;
            grad_w += err * z;
            grad_b += err;
        }
        weight -= opts.learning_rate * (grad_w / n + l2 * weight);
        bias -= opts.learning_rate * (grad_b / n);
    }

    let trained_at = Utc::now();
    Ok(LogisticArtifact {
        version: format!("lr-{}", trained_at.format("%Y%m%dT%H%M%SZ")),
        trained_at,
        feature_names: vec![FEATURE_COUNT.to_string()],
        mean,
        std,
        weight,
        bias,
        samples: samples.len(),
        label_threshold,
    })
}

/// Train from the full event history held in `store`.
pub fn train_from_store(
    store: &dyn TrafficStore,
    rule: &RuleClassifier,
    opts: &TrainOptions,
) -> Result<LogisticArtifact, DetectError> {
    let events = store.list_events()?;
    let windows = window::aggregate(&events);
    let samples = label_windows(&windows, rule);
    let artifact = fit(&samples, rule.threshold(), opts)?;
    info!(
        events = events.len(),
        windows = windows.len(),
        weight = artifact.weight,
        bias = artifact.bias,
        "trained scoring artifact"
    );
    Ok(artifact)
}
