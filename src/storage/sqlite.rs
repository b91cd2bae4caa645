use rusqlite::params;
use tracing::debug;

use super::{decode_ts, encode_ts, EventQuery, Pool, StoreError, TrafficStore};
use crate::detect::{Alert, TrafficEvent};

/// `TrafficStore` backed by the pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl TrafficStore for SqliteStore {
    fn insert_event(&self, event: &TrafficEvent) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO traffic_logs (ip, path, timestamp) VALUES (?1, ?2, ?3)",
            params![event.identity, event.path, encode_ts(&event.timestamp)],
        )?;
        Ok(())
    }

    fn query_events(&self, query: &EventQuery) -> Result<Vec<TrafficEvent>, StoreError> {
        let mut sql = String::from("SELECT id, ip, path, timestamp FROM traffic_logs WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();

        if let Some(identity) = &query.identity {
            args.push(identity.clone());
            sql.push_str(&format!(" AND ip = ?{}", args.len()));
        }
        if let Some(since) = &query.since {
            args.push(encode_ts(since));
            sql.push_str(&format!(" AND timestamp >= ?{}", args.len()));
        }
        if let Some(until) = &query.until {
            args.push(encode_ts(until));
            sql.push_str(&format!(" AND timestamp < ?{}", args.len()));
        }
        sql.push_str(" ORDER BY id ASC");

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut events = Vec::new();
        for r in rows {
            let (id, identity, path, raw_ts) = r?;
            events.push(TrafficEvent {
                identity,
                path,
                timestamp: decode_ts(id, &raw_ts)?,
            });
        }
        debug!(count = events.len(), ?query, "loaded traffic events");
        Ok(events)
    }

    fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO alerts (ip, reason, timestamp) VALUES (?1, ?2, ?3)",
            params![alert.identity, alert.reason, encode_ts(&alert.timestamp)],
        )?;
        Ok(())
    }

    fn list_alerts(&self) -> Result<Vec<Alert>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, ip, reason, timestamp FROM alerts ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for r in rows {
            let (id, identity, reason, raw_ts) = r?;
            alerts.push(Alert {
                identity,
                reason,
                timestamp: decode_ts(id, &raw_ts)?,
            });
        }
        Ok(alerts)
    }
}
