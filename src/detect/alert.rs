use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::Alert;
use crate::storage::{StoreError, TrafficStore};

/// Reason recorded for windows flagged by the rate rule.
pub const HIGH_REQUEST_RATE: &str = "High request rate";

/// Appends alerts to the store.
///
/// Every call writes a new row: repeated detection over the same data records
/// the same window again. Nothing is suppressed or merged.
#[derive(Clone)]
pub struct AlertRecorder {
    store: Arc<dyn TrafficStore>,
}

impl AlertRecorder {
    pub fn new(store: Arc<dyn TrafficStore>) -> Self {
        Self { store }
    }

    pub fn record(&self, identity: &str, reason: &str) -> Result<Alert, StoreError> {
        let alert = Alert::new(identity, reason, Utc::now());
        self.store.insert_alert(&alert)?;
        warn!(identity = %identity, reason = %reason, "alert recorded");
        Ok(alert)
    }

    pub fn list(&self) -> Result<Vec<Alert>, StoreError> {
        self.store.list_alerts()
    }
}
