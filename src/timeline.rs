//! Daily timeline assembly.
//!
//! Each source is queried over its own window (see [`crate::window`]),
//! filtered to the requested local date and normalized. A source that
//! fails contributes nothing; the rest of the day is still returned.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::error::{DaypackError, Result};
use crate::extrema::{detect_extrema, sample_instants, zip_samples, SAMPLE_INTERVAL_MINUTES};
use crate::models::{Event, Observer};
use crate::normalize::normalize_on_date;
use crate::sources::{Ephemeris, TideSource};
use crate::window::DayWindows;

/// Capabilities the timeline draws from. Tides are optional; `None` means
/// tide data is disabled.
#[derive(Clone)]
pub struct TimelineSources {
    pub ephemeris: Arc<dyn Ephemeris>,
    pub tides: Option<Arc<dyn TideSource>>,
}

// ---

pub async fn sun_events(
    eph: &dyn Ephemeris,
    observer: Observer,
    day: &DayWindows,
) -> Result<Vec<Event>> {
    let raw = eph.sun_events(observer, day.sun).await?;
    Ok(normalize_on_date(
        raw.into_iter().map(|(at, kind)| (at, kind.label())),
        day.date,
        day.tz,
    ))
}

pub async fn moon_events(
    eph: &dyn Ephemeris,
    observer: Observer,
    day: &DayWindows,
) -> Result<Vec<Event>> {
    let raw = eph.moon_events(observer, day.moon).await?;
    Ok(normalize_on_date(
        raw.into_iter().map(|(at, kind)| (at, kind.label())),
        day.date,
        day.tz,
    ))
}

pub async fn phase_events(eph: &dyn Ephemeris, day: &DayWindows) -> Result<Vec<Event>> {
    let raw = eph.moon_phases(day.phases).await?;
    Ok(normalize_on_date(
        raw.into_iter().map(|(at, phase)| (at, phase.label())),
        day.date,
        day.tz,
    ))
}

/// Perigee/apogee events detected in the extrema window that fall on the
/// local date.
pub async fn extrema_events(eph: &dyn Ephemeris, day: &DayWindows) -> Result<Vec<Event>> {
    // ---
    let instants = sample_instants(&day.extrema, Duration::minutes(SAMPLE_INTERVAL_MINUTES));
    let distances = eph.earth_moon_distances_km(&instants).await?;
    if distances.len() != instants.len() {
        return Err(DaypackError::unavailable(
            "moon distance",
            format!("expected {} samples, got {}", instants.len(), distances.len()),
        ));
    }

    let found = detect_extrema(&zip_samples(&instants, &distances));
    debug!("{} distance extrema in {:?}", found.len(), day.extrema);
    Ok(normalize_on_date(
        found.into_iter().map(|e| (e.point.instant_utc, e.label())),
        day.date,
        day.tz,
    ))
}

pub async fn tide_events(
    tides: Option<&dyn TideSource>,
    observer: Observer,
    day: &DayWindows,
) -> Result<Vec<Event>> {
    // ---
    let Some(tides) = tides else {
        debug!("Tide source disabled");
        return Ok(Vec::new());
    };
    let raw = tides.tide_extremes(observer, day.tides).await?;
    Ok(normalize_on_date(
        raw.into_iter().map(|t| (t.instant_utc, t.label())),
        day.date,
        day.tz,
    ))
}

/// Turn a source result into its contribution, logging failures.
pub fn contribution(source_name: &str, result: Result<Vec<Event>>) -> Vec<Event> {
    match result {
        Ok(events) => events,
        Err(e) => {
            warn!(source = source_name, "Source contributed no events: {}", e);
            Vec::new()
        }
    }
}

/// Concatenate per-source lists in order and stable-sort by UTC instant,
/// so simultaneous events keep source order.
pub fn merge_timeline(blocks: Vec<Vec<Event>>) -> Vec<Event> {
    // ---
    let mut events: Vec<Event> = blocks.into_iter().flatten().collect();
    events.sort_by_key(|e| e.at());
    events
}

/// Build the full timeline for one observer and local day. Never fails;
/// unavailable sources are left out.
pub async fn build_timeline(
    sources: &TimelineSources,
    observer: Observer,
    day: &DayWindows,
) -> Vec<Event> {
    // ---
    let eph = sources.ephemeris.as_ref();
    let tides = sources.tides.as_deref();

    let (sun, moon, phases, extrema, tide) = tokio::join!(
        sun_events(eph, observer, day),
        moon_events(eph, observer, day),
        phase_events(eph, day),
        extrema_events(eph, day),
        tide_events(tides, observer, day),
    );

    let mut lunar = contribution("moon phases", phases);
    lunar.extend(contribution("moon distance", extrema));

    let events = merge_timeline(vec![
        contribution("sun", sun),
        contribution("moon", moon),
        lunar,
        contribution("tides", tide),
    ]);
    debug!("Timeline for {} in {}: {} events", day.date, day.tz, events.len());
    events
}
