//! Event and alert persistence -- the `TrafficStore` seam, SQLite pool, schema.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

use crate::detect::{Alert, TrafficEvent};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Failures reaching or querying the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Range filter over stored traffic events. All bounds are optional;
/// `since` is inclusive and `until` exclusive.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub identity: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EventQuery {
    /// Every retained event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Events with `timestamp >= since`.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn matches(&self, event: &TrafficEvent) -> bool {
        if let Some(identity) = &self.identity {
            if &event.identity != identity {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp >= until {
                return false;
            }
        }
        true
    }
}

/// Append-only store of traffic events and alerts.
///
/// Every call is independent: implementations acquire whatever resource they
/// need for the duration of the call and release it on return.
pub trait TrafficStore: Send + Sync {
    fn insert_event(&self, event: &TrafficEvent) -> Result<(), StoreError>;

    /// Events matching `query`, in insertion order.
    fn query_events(&self, query: &EventQuery) -> Result<Vec<TrafficEvent>, StoreError>;

    fn list_events(&self) -> Result<Vec<TrafficEvent>, StoreError> {
        self.query_events(&EventQuery::all())
    }

    fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError>;

    /// Alerts in insertion order.
    fn list_alerts(&self) -> Result<Vec<Alert>, StoreError>;
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Fixed-width RFC 3339 at full nanosecond precision so that lexical order
/// in SQLite equals time order and values round-trip exactly.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_ts(id: i64, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id,
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}
