//! DayPack: one local day of sun, moon and tide events, plus a background
//! geomagnetic storm watcher.
//!
//! # Module structure
//!
//! ```text
//! daypack
//! ├── config     # environment-driven configuration
//! ├── error      # DaypackError and the library Result alias
//! ├── models     # Event, TimeWindow, SeverityLevel, raw source events
//! ├── window     # per-source UTC scan windows for a local day
//! ├── normalize  # UTC instant -> minute-precision local event
//! ├── extrema    # perigee/apogee detection on a sampled distance curve
//! ├── timeline   # per-source producers and the merged, sorted timeline
//! ├── registry   # shared push-token set
//! ├── watcher    # storm escalation state machine and polling task
//! ├── sources    # capability traits and their HTTP adapters
//! └── routes     # axum request surface
//! ```
//!
//! Routes and the binary import through the re-exports below rather than
//! reaching into individual modules.

pub mod config;
pub mod error;
pub mod extrema;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod routes;
pub mod sources;
pub mod timeline;
pub mod watcher;
pub mod window;

pub use config::Config;
pub use error::{DaypackError, Result};
pub use models::{latest_sample, Event, Observer, SeverityLevel, SeveritySample, TimeWindow};
pub use registry::DeviceRegistry;
pub use routes::{router, AppState};
pub use sources::{Ephemeris, Notifier, SeveritySource, TideSource};
pub use timeline::TimelineSources;
pub use watcher::{StormWatcher, WatcherState};
pub use window::DayWindows;
