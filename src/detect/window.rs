//! Fixed one-minute windows per identity.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

use super::{TrafficEvent, WindowCount};

/// Window length in seconds. Trained artifacts assume this granularity.
pub const WINDOW_SECS: i64 = 60;

/// Truncate `ts` down to the start of its window (floor, never round).
pub fn window_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let into_window = ts.timestamp().rem_euclid(WINDOW_SECS);
    ts - TimeDelta::seconds(into_window) - TimeDelta::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
}

/// Count events per `(identity, window_start)`.
///
/// Only pairs with at least one event appear. Output is sorted by identity,
/// then window start, so repeated calls over the same events compare equal.
pub fn aggregate<'a, I>(events: I) -> Vec<WindowCount>
where
    I: IntoIterator<Item = &'a TrafficEvent>,
{
    let mut counts: BTreeMap<(&'a str, DateTime<Utc>), u64> = BTreeMap::new();
    for event in events {
        *counts
            .entry((event.identity.as_str(), window_start(event.timestamp)))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((identity, window_start), count)| WindowCount {
            identity: identity.to_string(),
            window_start,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, h, m, s).unwrap()
    }

    #[test]
    fn test_window_start_floors() {
        assert_eq!(window_start(at(10, 0, 59)), at(10, 0, 0));
        assert_eq!(window_start(at(10, 1, 0)), at(10, 1, 0));
        let subsec = at(10, 2, 59) + TimeDelta::milliseconds(999);
        assert_eq!(window_start(subsec), at(10, 2, 0));
    }

    #[test]
    fn test_window_start_before_epoch() {
        let ts = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        assert_eq!(window_start(ts), Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap());
    }

    #[test]
    fn test_aggregate_counts_per_identity_and_minute() {
        let events = vec![
            TrafficEvent::new("10.0.0.9", "/", at(10, 0, 5)),
            TrafficEvent::new("10.0.0.5", "/", at(10, 0, 59)),
            TrafficEvent::new("10.0.0.5", "/a", at(10, 0, 0)),
            TrafficEvent::new("10.0.0.5", "/", at(10, 1, 0)),
            // late arrival for an earlier minute
            TrafficEvent::new("10.0.0.5", "/", at(10, 0, 30)),
        ];

        let windows = aggregate(&events);
        assert_eq!(
            windows,
            vec![
                WindowCount { identity: "10.0.0.5".into(), window_start: at(10, 0, 0), count: 3 },
                WindowCount { identity: "10.0.0.5".into(), window_start: at(10, 1, 0), count: 1 },
                WindowCount { identity: "10.0.0.9".into(), window_start: at(10, 0, 0), count: 1 },
            ]
        );
    }

    #[test]
    fn test_aggregate_is_deterministic_and_order_insensitive() {
        let mut events: Vec<TrafficEvent> = (0..40)
            .map(|i| TrafficEvent::new(format!("10.0.0.{}", i % 3), "/", at(10, i % 4, i % 60)))
            .collect();
        let first = aggregate(&events);
        events.reverse();
        assert_eq!(first, aggregate(&events));
        assert_eq!(first.iter().map(|w| w.count).sum::<u64>(), 40);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&Vec::<TrafficEvent>::new()).is_empty());
    }
}
