//! Geomagnetic storm escalation watcher.
//!
//! A background task polls the K-index feed on a fixed period, maps the
//! latest sample to a G-level and alerts registered devices only when the
//! level rises above the last alerted one. A sample below G1 clears the
//! memory, so the next storm alerts again from scratch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DaypackError, Result};
use crate::models::{latest_sample, SeverityLevel};
use crate::registry::DeviceRegistry;
use crate::sources::{Notifier, SeveritySource};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Memory of the last level an alert went out for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherState {
    pub last_sent_level: Option<SeverityLevel>,
}

impl WatcherState {
    /// Apply one observed level. Returns the level to alert for, if any.
    ///
    /// - `None` resets memory and never alerts.
    /// - A level alerts when nothing was sent yet or it is strictly higher
    ///   than the last sent level.
    /// - Equal or lower levels are ignored.
    pub fn observe(&mut self, level: Option<SeverityLevel>) -> Option<SeverityLevel> {
        // ---
        match (level, self.last_sent_level) {
            (None, _) => {
                self.last_sent_level = None;
                None
            }
            (Some(current), Some(last)) if current <= last => None,
            (Some(current), _) => {
                self.last_sent_level = Some(current);
                Some(current)
            }
        }
    }
}

/// One outgoing storm alert.
#[derive(Debug, Clone, PartialEq)]
pub struct StormAlert {
    pub id: Uuid,
    pub level: SeverityLevel,
    pub kp: f64,
    pub title: String,
    pub body: String,
}

impl StormAlert {
    pub fn new(level: SeverityLevel, kp: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            kp,
            title: format!("Geomagnetic storm {level}"),
            body: format!("Current Kp ≈ {kp:.1}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Watcher task
// ---------------------------------------------------------------------------

pub struct StormWatcher {
    feed: Arc<dyn SeveritySource>,
    notifier: Arc<dyn Notifier>,
    registry: DeviceRegistry,
    period: Duration,
    state: WatcherState,
}

impl StormWatcher {
    // ---
    pub fn new(
        feed: Arc<dyn SeveritySource>,
        notifier: Arc<dyn Notifier>,
        registry: DeviceRegistry,
        period: Duration,
    ) -> Self {
        Self {
            feed,
            notifier,
            registry,
            period,
            state: WatcherState::default(),
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Run one watch cycle. On a feed error the state is left untouched.
    pub async fn poll_once(&mut self) -> Result<Option<StormAlert>> {
        // ---
        let mut series = self.feed.severity_series().await?;
        let Some(latest) = latest_sample(&mut series) else {
            debug!("K-index feed returned no samples");
            return Ok(None);
        };

        let level = SeverityLevel::from_kp(latest.kp);
        debug!(
            "Latest Kp {:.2} at {} -> {:?} (last sent {:?})",
            latest.kp, latest.time_utc, level, self.state.last_sent_level
        );

        let Some(level) = self.state.observe(level) else {
            return Ok(None);
        };

        let alert = StormAlert::new(level, latest.kp);
        let delivered = self.dispatch(&alert).await;
        info!(alert_id = %alert.id, "{} alert sent to {} device(s)", alert.level, delivered);
        Ok(Some(alert))
    }

    /// Fan an alert out to a snapshot of the registry. Tokens the push
    /// service rejects are dropped; any other failure keeps the token.
    /// Returns the number of successful deliveries.
    pub async fn dispatch(&self, alert: &StormAlert) -> usize {
        // ---
        let targets = self.registry.snapshot();
        let mut delivered = 0;

        for token in targets {
            match self
                .notifier
                .send_alert(&alert.title, &alert.body, &token)
                .await
            {
                Ok(()) => delivered += 1,
                Err(DaypackError::TokenRejected { reason }) => {
                    warn!(alert_id = %alert.id, "Dropping rejected device token: {}", reason);
                    self.registry.unregister(&token);
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, "Alert not delivered, keeping token: {}", e);
                }
            }
        }
        delivered
    }

    /// Poll until `shutdown` flips to `true` or its sender goes away.
    /// Iteration errors are logged and never end the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        // ---
        let mut ticker = tokio::time::interval(self.period);
        info!("Storm watcher started, polling every {}s", self.period.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!("Storm watch iteration failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Storm watcher stopped");
    }
}
