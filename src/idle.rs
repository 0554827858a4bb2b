//! Idle view upkeep
//!
//! Keeps the clock/date fresh on a fast cadence and the weather on a slow
//! one. Weather fetches run on their own task and hand their result back
//! through a oneshot channel, so `tick` never waits on the network. A failed
//! or timed out fetch leaves the last good reading in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::display::{format_clock, format_date};
use crate::weather::{WeatherReading, WeatherSource};
use crate::{Error, Result};

/// Cached contents of the idle view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdleSnapshot {
    pub time: String,
    pub date: String,
    pub location: String,
    pub temperature_c: Option<f32>,
    pub time_updated: Option<DateTime<Utc>>,
    pub weather_updated: Option<DateTime<Utc>>,
}

/// Cadences for the idle monitor
#[derive(Debug, Clone, Copy)]
pub struct IdleSettings {
    /// How often the clock fields are recomputed
    pub redraw_every: Duration,
    /// How often a weather refresh is attempted
    pub weather_every: Duration,
    /// Upper bound on a single weather fetch
    pub weather_timeout: Duration,
    /// Local time offset for the clock
    pub utc_offset: FixedOffset,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Clock fields were recomputed
    pub clock_refreshed: bool,
    /// A new weather fetch was started
    pub weather_dispatched: bool,
    /// A finished fetch was applied (`Some(true)`) or discarded (`Some(false)`)
    pub weather_applied: Option<bool>,
}

type WeatherResult = Result<WeatherReading>;

/// Time-driven refresh of the idle view
pub struct IdleMonitor {
    settings: IdleSettings,
    source: Option<Arc<dyn WeatherSource>>,
    snapshot: IdleSnapshot,
    last_clock: Option<Instant>,
    last_weather: Option<Instant>,
    in_flight: Option<oneshot::Receiver<WeatherResult>>,
    dirty: bool,
}

impl IdleMonitor {
    /// Create a monitor; `location` is shown until the first reading arrives
    #[must_use]
    pub fn new(
        settings: IdleSettings,
        source: Option<Arc<dyn WeatherSource>>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            source,
            snapshot: IdleSnapshot {
                location: location.into(),
                ..IdleSnapshot::default()
            },
            last_clock: None,
            last_weather: None,
            in_flight: None,
            dirty: true,
        }
    }

    /// Advance the monitor; cheap and never waits on I/O
    ///
    /// Must be called from within a tokio runtime, since due weather
    /// refreshes are spawned onto it.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        if is_due(self.last_clock, now, self.settings.redraw_every) {
            self.refresh_clock(wall);
            self.last_clock = Some(now);
            report.clock_refreshed = true;
        }

        report.weather_applied = self.collect_weather(wall);

        if self.in_flight.is_none()
            && self.source.is_some()
            && is_due(self.last_weather, now, self.settings.weather_every)
        {
            self.dispatch_weather();
            self.last_weather = Some(now);
            report.weather_dispatched = true;
        }

        report
    }

    /// Fetch the weather and wait for it, bounded by the configured timeout
    ///
    /// Used once at boot so the first idle view already has a reading.
    ///
    /// # Errors
    ///
    /// Returns error if no source is configured or the fetch fails; the
    /// snapshot is left untouched in that case.
    pub async fn refresh_weather_now(&mut self) -> Result<()> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| Error::Config("no weather source configured".to_string()))?;

        self.last_weather = Some(Instant::now());
        let reading = fetch_bounded(source.as_ref(), self.settings.weather_timeout).await?;
        self.apply_weather(reading, Utc::now());
        Ok(())
    }

    /// Current idle contents
    #[must_use]
    pub const fn snapshot(&self) -> &IdleSnapshot {
        &self.snapshot
    }

    /// Whether the view changed since it was last drawn; clears the flag
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Force the next tick to redraw, e.g. after the chat view was shown
    pub fn invalidate(&mut self) {
        self.dirty = true;
        self.last_clock = None;
    }

    /// Whether a weather source is configured
    #[must_use]
    pub const fn has_weather(&self) -> bool {
        self.source.is_some()
    }

    /// Whether a weather fetch is currently running
    #[must_use]
    pub const fn weather_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn refresh_clock(&mut self, wall: DateTime<Utc>) {
        let local = wall.with_timezone(&self.settings.utc_offset);
        let time = format_clock(&local);
        let date = format_date(&local);

        if time != self.snapshot.time || date != self.snapshot.date {
            self.snapshot.time = time;
            self.snapshot.date = date;
            self.dirty = true;
        }
        self.snapshot.time_updated = Some(wall);
    }

    fn dispatch_weather(&mut self) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let timeout = self.settings.weather_timeout;
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let result = fetch_bounded(source.as_ref(), timeout).await;
            // Receiver may be gone if the monitor was dropped
            let _ = tx.send(result);
        });

        tracing::debug!("weather refresh dispatched");
        self.in_flight = Some(rx);
    }

    fn collect_weather(&mut self, wall: DateTime<Utc>) -> Option<bool> {
        let rx = self.in_flight.as_mut()?;

        match rx.try_recv() {
            Ok(Ok(reading)) => {
                self.in_flight = None;
                self.apply_weather(reading, wall);
                Some(true)
            }
            Ok(Err(e)) => {
                self.in_flight = None;
                tracing::warn!(error = %e, "weather refresh failed, keeping last reading");
                Some(false)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.in_flight = None;
                tracing::warn!("weather task ended without a result");
                Some(false)
            }
        }
    }

    fn apply_weather(&mut self, reading: WeatherReading, wall: DateTime<Utc>) {
        let WeatherReading {
            place,
            temperature_c,
        } = reading;

        tracing::info!(place = %place, temperature_c, "weather updated");
        self.snapshot.location = place;
        self.snapshot.temperature_c = Some(temperature_c);
        self.snapshot.weather_updated = Some(wall);
        self.dirty = true;
    }
}

fn is_due(last: Option<Instant>, now: Instant, every: Duration) -> bool {
    last.is_none_or(|last| now.saturating_duration_since(last) >= every)
}

async fn fetch_bounded(source: &dyn WeatherSource, timeout: Duration) -> WeatherResult {
    tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| Error::Weather(format!("timed out after {timeout:?}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> IdleSettings {
        IdleSettings {
            redraw_every: Duration::from_secs(1),
            weather_every: Duration::from_secs(600),
            weather_timeout: Duration::from_secs(5),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    #[test]
    fn test_is_due() {
        let now = Instant::now();
        assert!(is_due(None, now, Duration::from_secs(1)));
        assert!(!is_due(Some(now), now, Duration::from_secs(1)));
        assert!(is_due(Some(now), now + Duration::from_secs(1), Duration::from_secs(1)));
    }

    #[test]
    fn test_clock_refresh_marks_dirty_only_on_change() {
        let mut monitor = IdleMonitor::new(settings(), None, "Hanoi");
        assert!(monitor.take_redraw());

        let start = Instant::now();
        let wall = Utc::now();
        let report = monitor.tick(start, wall);
        assert!(report.clock_refreshed);
        assert!(!report.weather_dispatched);
        assert!(monitor.take_redraw());

        // Same minute, a second later: fields unchanged
        let report = monitor.tick(start + Duration::from_secs(1), wall);
        assert!(report.clock_refreshed);
        assert!(!monitor.take_redraw());
    }

    #[test]
    fn test_invalidate_forces_redraw() {
        let mut monitor = IdleMonitor::new(settings(), None, "Hanoi");
        let now = Instant::now();
        monitor.tick(now, Utc::now());
        monitor.take_redraw();

        monitor.invalidate();
        assert!(monitor.take_redraw());
        assert!(monitor.tick(now, Utc::now()).clock_refreshed);
    }
}
