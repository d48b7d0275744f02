//! Projection of UTC instants onto a local timezone.
//!
//! The offset applied is the zone's offset at that specific instant, so
//! two events on either side of a DST change render with different
//! suffixes.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::models::Event;

/// ISO-8601 local timestamp at minute precision, e.g. `2024-06-21T06:30+10:00`.
const LOCAL_MINUTE_FORMAT: &str = "%Y-%m-%dT%H:%M%:z";

// ---

/// Render `at` in `tz` at minute precision. Seconds are truncated.
pub fn to_local_string(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz)
        .format(LOCAL_MINUTE_FORMAT)
        .to_string()
}

/// Calendar date of `at` as seen in `tz`.
pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Build the canonical timeline event for a UTC instant.
pub fn normalize(at: DateTime<Utc>, label: impl Into<String>, tz: Tz) -> Event {
    Event::new(at, to_local_string(at, tz), label.into())
}

/// Normalize `(instant, label)` pairs, keeping only those that fall on
/// `date` in `tz`.
pub fn normalize_on_date<I, L>(raw: I, date: NaiveDate, tz: Tz) -> Vec<Event>
where
    I: IntoIterator<Item = (DateTime<Utc>, L)>,
    L: Into<String>,
{
    // ---
    raw.into_iter()
        .filter(|(at, _)| local_date(*at, tz) == date)
        .map(|(at, label)| normalize(at, label, tz))
        .collect()
}
