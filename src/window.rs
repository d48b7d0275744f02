//! UTC scan windows for one local calendar day.
//!
//! Each source gets a window wide enough that no event belonging to the
//! local day is missed; producers filter back down to the local date after
//! querying. All windows are half-open `[start, end)`.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::{DaypackError, Result};
use crate::models::TimeWindow;

/// Longest DST gap searched when local midnight does not exist.
const MAX_GAP_MINUTES: i64 = 4 * 60;

// ---

/// Parse a request date. Accepts `YYYY-MM-DD`, or an ISO date-time whose
/// date part is used as written.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    // ---
    let s = input.trim();
    let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            let dt = DateTime::parse_from_rfc3339(s).ok()?;
            Some(dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|dt| dt.date())
        });

    match parsed {
        Some(date) if (1..=9999).contains(&date.year()) => Ok(date),
        _ => Err(DaypackError::InvalidDate(input.to_string())),
    }
}

/// Parse an IANA timezone identifier.
pub fn parse_timezone(input: &str) -> Result<Tz> {
    input
        .trim()
        .parse::<Tz>()
        .map_err(|_| DaypackError::InvalidTimezone(input.to_string()))
}

/// Resolve a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside
/// a DST gap move forward to the first existing minute.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    // ---
    for step in 0..=MAX_GAP_MINUTES {
        let candidate = naive + Duration::minutes(step);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => continue,
        }
    }
    // No zone in the tz database has a gap this long.
    Utc.from_utc_datetime(&naive)
}

/// UTC instant of local midnight starting `date` in `tz`.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    resolve_local(date.and_time(NaiveTime::MIN), tz)
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exact local day: `[local midnight D, local midnight D+1)`.
pub fn sun_window(date: NaiveDate, tz: Tz) -> TimeWindow {
    TimeWindow::new(
        local_midnight(date, tz),
        local_midnight(date + Duration::days(1), tz),
    )
}

/// 36 local wall-clock hours from local midnight of D, i.e. up to local
/// noon of D+1, so moon events late in the local day are never cut off.
pub fn moon_window(date: NaiveDate, tz: Tz) -> TimeWindow {
    // ---
    let end_local = (date + Duration::days(1)).and_time(NaiveTime::MIN) + Duration::hours(12);
    TimeWindow::new(local_midnight(date, tz), resolve_local(end_local, tz))
}

/// Centered distance-sampling window `[D 00:00Z - 12h, D 00:00Z + 24h)`.
pub fn extrema_window(date: NaiveDate) -> TimeWindow {
    let midnight = utc_midnight(date);
    let start = midnight - Duration::hours(12);
    TimeWindow::new(start, midnight + Duration::hours(24))
}

/// Three UTC calendar days `[D-1, D+2)` for the rare phase instants.
pub fn phase_window(date: NaiveDate) -> TimeWindow {
    let midnight = utc_midnight(date);
    TimeWindow::new(midnight - Duration::days(1), midnight + Duration::days(2))
}

/// Smallest window covering both the UTC day D and the local day D.
pub fn tide_window(date: NaiveDate, tz: Tz) -> TimeWindow {
    // ---
    let local = sun_window(date, tz);
    let utc_start = utc_midnight(date);
    let utc_end = utc_start + Duration::days(1);
    TimeWindow::new(local.start_utc.min(utc_start), local.end_utc.max(utc_end))
}

/// Every window needed to build one day's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindows {
    pub date: NaiveDate,
    pub tz: Tz,
    pub sun: TimeWindow,
    pub moon: TimeWindow,
    pub extrema: TimeWindow,
    pub phases: TimeWindow,
    pub tides: TimeWindow,
}

impl DayWindows {
    // ---
    pub fn new(date: NaiveDate, tz: Tz) -> Self {
        Self {
            date,
            tz,
            sun: sun_window(date, tz),
            moon: moon_window(date, tz),
            extrema: extrema_window(date),
            phases: phase_window(date),
            tides: tide_window(date, tz),
        }
    }

    /// Parse raw request strings and derive the windows.
    pub fn parse(date: &str, tz: &str) -> Result<Self> {
        let tz = parse_timezone(tz)?;
        let date = parse_date(date)?;
        Ok(Self::new(date, tz))
    }
}
