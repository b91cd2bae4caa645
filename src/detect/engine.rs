use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::alert::AlertRecorder;
use super::classifier::ModelClassifier;
use super::rule::RuleClassifier;
use super::{explain, window, Alert, DetectError, TrafficEvent, WindowCount};
use crate::config::{DetectionConfig, MAX_LOOKBACK_SECS};
use crate::model::ModelSource;
use crate::storage::{EventQuery, TrafficStore};

/// Model verdict for a single window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowVerdict {
    #[serde(rename = "ip")]
    pub identity: String,
    pub window_start: DateTime<Utc>,
    pub count: u64,
    pub is_anomaly: bool,
}

/// Result of classifying the full history with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelDetection {
    /// The store holds no events at all.
    NoLogs,
    /// One verdict per window, flagged or not.
    Windows(Vec<WindowVerdict>),
}

/// A model-flagged window with its explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedWindow {
    #[serde(rename = "ip")]
    pub identity: String,
    pub window_start: DateTime<Utc>,
    pub count: u64,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Explanation {
    /// The store holds no events at all.
    NoTraffic,
    /// Events exist but the model flagged none of their windows.
    NoAttacks,
    Attacks(Vec<ExplainedWindow>),
}

/// Composes aggregation, both classifiers, alert recording and explanation
/// into the detection operations.
///
/// Holds no classification state between calls: every operation rescans the
/// store, so concurrent calls never wait on each other.
#[derive(Clone)]
pub struct DetectionEngine {
    store: Arc<dyn TrafficStore>,
    model: Arc<dyn ModelSource>,
    rule: RuleClassifier,
    recorder: AlertRecorder,
    lookback: TimeDelta,
    alert_reason: String,
}

impl DetectionEngine {
    pub fn new(store: Arc<dyn TrafficStore>, model: Arc<dyn ModelSource>) -> Self {
        Self::with_config(store, model, &DetectionConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn TrafficStore>,
        model: Arc<dyn ModelSource>,
        config: &DetectionConfig,
    ) -> Self {
        let recorder = AlertRecorder::new(Arc::clone(&store));
        let lookback_secs = config.lookback_secs.clamp(1, MAX_LOOKBACK_SECS);
        if lookback_secs != config.lookback_secs {
            warn!(
                requested = config.lookback_secs,
                using = lookback_secs,
                "lookback out of range, clamped"
            );
        }
        Self {
            store,
            model,
            rule: RuleClassifier::new(config.threshold),
            recorder,
            lookback: TimeDelta::try_seconds(lookback_secs)
                .unwrap_or_else(|| TimeDelta::seconds(window::WINDOW_SECS)),
            alert_reason: config.alert_reason.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TrafficStore> {
        &self.store
    }

    pub fn rule(&self) -> &RuleClassifier {
        &self.rule
    }

    pub fn ingest(&self, identity: &str, path: &str, timestamp: DateTime<Utc>) -> Result<(), DetectError> {
        self.store
            .insert_event(&TrafficEvent::new(identity, path, timestamp))?;
        Ok(())
    }

    pub fn list_events(&self, query: &EventQuery) -> Result<Vec<TrafficEvent>, DetectError> {
        Ok(self.store.query_events(query)?)
    }

    pub fn list_alerts(&self) -> Result<Vec<Alert>, DetectError> {
        Ok(self.recorder.list()?)
    }

    /// Flag identities whose recent windows exceed the rate threshold.
    pub fn rate_detect(&self) -> Result<Vec<String>, DetectError> {
        self.rate_detect_at(Utc::now())
    }

    /// Rate detection as of `now`: only events with `timestamp >= now - lookback`
    /// are considered. One alert is recorded per flagged window; the returned
    /// identities are unique and sorted.
    pub fn rate_detect_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, DetectError> {
        let since = now
            .checked_sub_signed(self.lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let events = self.store.query_events(&EventQuery::since(since))?;
        let windows = window::aggregate(&events);

        let mut flagged = BTreeSet::new();
        for w in windows.iter().filter(|w| self.rule.is_anomalous(w)) {
            self.recorder.record(&w.identity, &self.alert_reason)?;
            flagged.insert(w.identity.clone());
        }

        info!(
            events = events.len(),
            windows = windows.len(),
            flagged = flagged.len(),
            "rate detection complete"
        );
        Ok(flagged.into_iter().collect())
    }

    /// Classify every window in the full history with the scoring artifact.
    pub fn model_detect(&self) -> Result<ModelDetection, DetectError> {
        let Some((classifier, windows)) = self.classify_history()? else {
            return Ok(ModelDetection::NoLogs);
        };

        let verdicts: Vec<WindowVerdict> = windows
            .into_iter()
            .map(|w| WindowVerdict {
                is_anomaly: classifier.is_anomalous(&w),
                identity: w.identity,
                window_start: w.window_start,
                count: w.count,
            })
            .collect();

        info!(
            windows = verdicts.len(),
            flagged = verdicts.iter().filter(|v| v.is_anomaly).count(),
            "model detection complete"
        );
        Ok(ModelDetection::Windows(verdicts))
    }

    /// Explain each window the scoring artifact flags.
    pub fn explain_detect(&self) -> Result<Explanation, DetectError> {
        let Some((classifier, windows)) = self.classify_history()? else {
            return Ok(Explanation::NoTraffic);
        };

        let explained: Vec<ExplainedWindow> = windows
            .iter()
            .filter(|w| classifier.is_anomalous(w))
            .map(|w| ExplainedWindow {
                explanation: explain::explain(w),
                identity: w.identity.clone(),
                window_start: w.window_start,
                count: w.count,
            })
            .collect();

        if explained.is_empty() {
            debug!(windows = windows.len(), "no attacks detected");
            return Ok(Explanation::NoAttacks);
        }
        Ok(Explanation::Attacks(explained))
    }

    /// Load the full history and the scorer. `None` when the store is empty,
    /// in which case the artifact is never loaded.
    fn classify_history(&self) -> Result<Option<(ModelClassifier, Vec<WindowCount>)>, DetectError> {
        let events = self.store.list_events()?;
        if events.is_empty() {
            return Ok(None);
        }
        let classifier = ModelClassifier::new(self.model.load()?);
        Ok(Some((classifier, window::aggregate(&events))))
    }
}
