//! Perigee/apogee detection over a sampled Earth-Moon distance curve.
//!
//! The curve is sampled at a fixed 30-minute step. An interior sample is an
//! extremum only when it is strictly below (perigee) or strictly above
//! (apogee) both neighbours; plateaus produce nothing, and an extremum that
//! lands on the first or last sample is not reported.

use chrono::{DateTime, Duration, Utc};

use crate::models::{SampledPoint, TimeWindow};

/// Distance sampling step.
pub const SAMPLE_INTERVAL_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Perigee,
    Apogee,
}

impl ExtremumKind {
    pub fn name(self) -> &'static str {
        match self {
            ExtremumKind::Perigee => "Perigee",
            ExtremumKind::Apogee => "Apogee",
        }
    }
}

/// A detected local minimum or maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub kind: ExtremumKind,
    pub point: SampledPoint,
}

impl Extremum {
    /// `Perigee (363,104 km)`
    pub fn label(&self) -> String {
        // Halves round away from zero: 363,104.5 km reads 363,105.
        format!(
            "{} ({} km)",
            self.kind.name(),
            group_thousands(self.point.value.round() as i64)
        )
    }
}

// ---

/// Sample instants from `window.start_utc` through `window.end_utc`
/// inclusive, every `interval`.
pub fn sample_instants(window: &TimeWindow, interval: Duration) -> Vec<DateTime<Utc>> {
    // ---
    let mut out = Vec::new();
    if interval <= Duration::zero() {
        return out;
    }
    let mut at = window.start_utc;
    while at <= window.end_utc {
        out.push(at);
        at += interval;
    }
    out
}

/// Evaluate `f` at every sample instant of `window`.
pub fn sample_series<F>(window: &TimeWindow, interval: Duration, mut f: F) -> Vec<SampledPoint>
where
    F: FnMut(DateTime<Utc>) -> f64,
{
    sample_instants(window, interval)
        .into_iter()
        .map(|instant_utc| SampledPoint {
            instant_utc,
            value: f(instant_utc),
        })
        .collect()
}

/// Pair pre-fetched values with their instants. Extra entries on either
/// side are dropped.
pub fn zip_samples(instants: &[DateTime<Utc>], values: &[f64]) -> Vec<SampledPoint> {
    instants
        .iter()
        .zip(values)
        .map(|(&instant_utc, &value)| SampledPoint { instant_utc, value })
        .collect()
}

/// Flag strict local minima and maxima among interior samples.
pub fn detect_extrema(points: &[SampledPoint]) -> Vec<Extremum> {
    // ---
    points
        .windows(3)
        .filter_map(|w| {
            let (prev, curr, next) = (w[0].value, w[1].value, w[2].value);
            let kind = if curr < prev && curr < next {
                ExtremumKind::Perigee
            } else if curr > prev && curr > next {
                ExtremumKind::Apogee
            } else {
                return None;
            };
            Some(Extremum { kind, point: w[1] })
        })
        .collect()
}

/// Format an integer with comma thousands separators.
pub fn group_thousands(n: i64) -> String {
    // ---
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
