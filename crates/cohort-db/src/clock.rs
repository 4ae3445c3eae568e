//! Stored timestamps.
//!
//! Every timestamp column holds fixed-width RFC 3339 UTC text with
//! microseconds, e.g. `2026-03-01T09:15:02.000417Z`, so string comparison in
//! SQL matches time order.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time, strictly increasing across calls within the process.
pub fn now_utc() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_micros();
    let mut prev = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(prev + 1);
        match LAST_MICROS.compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
            Err(actual) => prev = actual,
        }
    }
}

pub fn now() -> String {
    format(now_utc())
}

/// Timestamp `d` from now, for expiry columns.
pub fn after(d: Duration) -> String {
    format(Utc::now() + d)
}

pub fn format(ts: DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let mut prev = now();
        for _ in 0..1000 {
            let next = now();
            assert!(next > prev, "{} should sort after {}", next, prev);
            prev = next;
        }
    }

    #[test]
    fn test_fixed_width_round_trip() {
        let ts = now_utc();
        let text = format(ts);
        assert_eq!(text.len(), "2026-03-01T09:15:02.000417Z".len());
        assert_eq!(parse(&text), Some(ts));
    }

    #[test]
    fn test_after_is_later() {
        assert!(after(Duration::minutes(5)) > now());
    }
}
