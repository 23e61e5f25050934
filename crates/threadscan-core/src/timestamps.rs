//! Timestamp conversion utilities.
//!
//! The store keeps message dates as unix seconds. Listings show them relative
//! to "now" so recent activity reads at a glance.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Convert unix seconds to a UTC datetime.
///
/// Values outside chrono's representable range clamp to the nearest bound
/// instead of panicking.
#[must_use]
pub fn unix_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(if secs < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Short human-readable description of `then` as seen from `now`.
///
/// - same day: `Today 14:05`
/// - previous day: `Yesterday 23:10`
/// - within the last week: `Tue 14:05`
/// - same year: `Mar 07`
/// - otherwise (including future dates on another day): `2023-03-07`
#[must_use]
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let then_day = then.date_naive();
    let now_day = now.date_naive();

    if then_day == now_day {
        return then.format("Today %H:%M").to_string();
    }
    if then_day > now_day {
        return then.format("%Y-%m-%d").to_string();
    }
    if now_day.pred_opt() == Some(then_day) {
        return then.format("Yesterday %H:%M").to_string();
    }
    if now.signed_duration_since(then) < Duration::days(7) {
        return then.format("%a %H:%M").to_string();
    }
    if then.year() == now.year() {
        return then.format("%b %d").to_string();
    }
    then.format("%Y-%m-%d").to_string()
}
