//! In-process `TrafficStore` used by tests and ephemeral runs.

use std::sync::RwLock;

use super::{EventQuery, StoreError, TrafficStore};
use crate::detect::{Alert, TrafficEvent};

#[derive(Default)]
struct Tables {
    events: Vec<TrafficEvent>,
    alerts: Vec<Alert>,
}

/// Vector-backed store with the same ordering semantics as `SqliteStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with events, as if ingested in order.
    pub fn with_events(events: impl IntoIterator<Item = TrafficEvent>) -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.inner.write() {
            tables.events.extend(events);
        }
        store
    }
}

impl TrafficStore for MemoryStore {
    fn insert_event(&self, event: &TrafficEvent) -> Result<(), StoreError> {
        let mut tables = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        tables.events.push(event.clone());
        Ok(())
    }

    fn query_events(&self, query: &EventQuery) -> Result<Vec<TrafficEvent>, StoreError> {
        let tables = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect())
    }

    fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut tables = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        tables.alerts.push(alert.clone());
        Ok(())
    }

    fn list_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        let tables = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.alerts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn test_memory_store_filters_like_sqlite() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let store = MemoryStore::with_events([
            TrafficEvent::new("10.0.0.5", "/", t0),
            TrafficEvent::new("10.0.0.5", "/", t0 + TimeDelta::seconds(90)),
            TrafficEvent::new("10.0.0.9", "/", t0 + TimeDelta::seconds(90)),
        ]);

        assert_eq!(store.list_events().unwrap().len(), 3);
        let since = store
            .query_events(&EventQuery::since(t0 + TimeDelta::seconds(60)))
            .unwrap();
        assert_eq!(since.len(), 2);
        let one = store
            .query_events(&EventQuery::since(t0 + TimeDelta::seconds(60)).identity("10.0.0.9"))
            .unwrap();
        assert_eq!(one.len(), 1);
    }
}
