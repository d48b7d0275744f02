//! Data models shared by the timeline engine, the storm watcher and the
//! HTTP routes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DaypackError, Result};

// ---

/// One entry of a daily timeline.
///
/// `time_local` is the minute-precision local rendering of `at`; it is
/// fixed when the event is built and never recomputed. Only `time_local`
/// and `label` are serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(skip)]
    at: DateTime<Utc>,
    time_local: String,
    label: String,
}

impl Event {
    // ---
    pub(crate) fn new(at: DateTime<Utc>, time_local: String, label: String) -> Self {
        Self {
            at,
            time_local,
            label,
        }
    }

    /// UTC instant the event was computed at; the timeline sort key.
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn time_local(&self) -> &str {
        &self.time_local
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Half-open UTC interval `[start_utc, end_utc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl TimeWindow {
    // ---
    pub fn new(start_utc: DateTime<Utc>, end_utc: DateTime<Utc>) -> Self {
        Self { start_utc, end_utc }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end_utc - self.start_utc
    }
}

/// One sample of a continuous scalar series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledPoint {
    pub instant_utc: DateTime<Utc>,
    pub value: f64,
}

/// Observer position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observer {
    pub lat: f64,
    pub lon: f64,
}

impl Observer {
    // ---
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        // ---
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(DaypackError::InvalidCoordinates { lat, lon });
        }
        Ok(Self { lat, lon })
    }
}

// ---------------------------------------------------------------------------
// Raw ephemeris and tide events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunEventKind {
    AstronomicalDawn,
    Sunrise,
    Sunset,
    AstronomicalDusk,
}

impl SunEventKind {
    pub fn label(self) -> &'static str {
        match self {
            SunEventKind::AstronomicalDawn => "Astronomical dawn",
            SunEventKind::Sunrise => "Sunrise",
            SunEventKind::Sunset => "Sunset",
            SunEventKind::AstronomicalDusk => "Astronomical dusk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoonEventKind {
    Rise,
    Set,
    UpperTransit,
    LowerTransit,
}

impl MoonEventKind {
    pub fn label(self) -> &'static str {
        match self {
            MoonEventKind::Rise => "Moonrise",
            MoonEventKind::Set => "Moonset",
            MoonEventKind::UpperTransit => "Moon above",
            MoonEventKind::LowerTransit => "Moon below",
        }
    }
}

/// Principal lunar phase index as reported by the ephemeris (0..3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MoonPhase(pub u8);

impl MoonPhase {
    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "New Moon",
            1 => "First Quarter",
            2 => "Full Moon",
            3 => "Last Quarter",
            _ => "Moon phase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TideKind {
    High,
    Low,
}

impl fmt::Display for TideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TideKind::High => f.write_str("High"),
            TideKind::Low => f.write_str("Low"),
        }
    }
}

/// A high or low water instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideExtreme {
    pub instant_utc: DateTime<Utc>,
    pub kind: TideKind,
    pub height_m: Option<f64>,
}

impl TideExtreme {
    /// `High tide 1.23 m`, or just `High tide` when the height is unknown.
    pub fn label(&self) -> String {
        // ---
        match self.height_m {
            Some(h) => format!("{} tide {:.2} m", self.kind, h),
            None => format!("{} tide", self.kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Geomagnetic severity
// ---------------------------------------------------------------------------

/// NOAA G-scale storm level. Variant order is the severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeverityLevel {
    G1,
    G2,
    G3,
    G4,
    G5,
}

impl SeverityLevel {
    /// Threshold mapping from planetary K-index. `None` means below the
    /// alerting threshold.
    pub fn from_kp(kp: f64) -> Option<SeverityLevel> {
        // ---
        if kp >= 9.0 {
            Some(SeverityLevel::G5)
        } else if kp >= 8.0 {
            Some(SeverityLevel::G4)
        } else if kp >= 7.0 {
            Some(SeverityLevel::G3)
        } else if kp >= 6.0 {
            Some(SeverityLevel::G2)
        } else if kp >= 5.0 {
            Some(SeverityLevel::G1)
        } else {
            None
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeverityLevel::G1 => "G1",
            SeverityLevel::G2 => "G2",
            SeverityLevel::G3 => "G3",
            SeverityLevel::G4 => "G4",
            SeverityLevel::G5 => "G5",
        };
        f.write_str(s)
    }
}

/// One point of the planetary K-index feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeveritySample {
    pub time_utc: DateTime<Utc>,
    pub kp: f64,
}

/// Sort a feed chronologically and return its latest point.
pub fn latest_sample(series: &mut [SeveritySample]) -> Option<SeveritySample> {
    // ---
    series.sort_by_key(|s| s.time_utc);
    series.last().copied()
}
