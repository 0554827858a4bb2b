//! Display surface contract
//!
//! Views are rendered from explicit values only; a display keeps no
//! conversation or clock state of its own.

use chrono::{DateTime, FixedOffset};

use crate::idle::IdleSnapshot;

/// Placeholder shown before any weather reading has succeeded
pub const TEMPERATURE_PLACEHOLDER: &str = "--°C";

/// Something that can show the idle and chat views
pub trait Display {
    /// Short status line shown while booting
    fn draw_boot(&mut self, message: &str);

    /// Clock, date and cached weather
    fn draw_idle(&mut self, snapshot: &IdleSnapshot);

    /// One exchange: what the user said and what the assistant answered
    fn draw_chat(&mut self, user_text: &str, assistant_text: &str);
}

/// Stand-in used when no panel could be initialized
///
/// Everything is dropped; calls are traced so headless runs stay observable.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn draw_boot(&mut self, message: &str) {
        tracing::trace!(message, "headless boot view");
    }

    fn draw_idle(&mut self, snapshot: &IdleSnapshot) {
        tracing::trace!(time = %snapshot.time, date = %snapshot.date, "headless idle view");
    }

    fn draw_chat(&mut self, user_text: &str, assistant_text: &str) {
        tracing::trace!(user_text, assistant_text, "headless chat view");
    }
}

/// `HH:MM` clock text
#[must_use]
pub fn format_clock(now: &DateTime<FixedOffset>) -> String {
    now.format("%H:%M").to_string()
}

/// `Mon 19-10-2026` date text
#[must_use]
pub fn format_date(now: &DateTime<FixedOffset>) -> String {
    now.format("%a %d-%m-%Y").to_string()
}

/// Rounded Celsius reading, or the placeholder when unknown
#[must_use]
pub fn format_temperature(temperature_c: Option<f32>) -> String {
    temperature_c.map_or_else(
        || TEMPERATURE_PLACEHOLDER.to_string(),
        |t| {
            #[allow(clippy::cast_possible_truncation)]
            let rounded = t.round() as i32;
            format!("{rounded}°C")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_and_date_format() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 19, 9, 5, 0).unwrap();

        assert_eq!(format_clock(&now), "09:05");
        assert_eq!(format_date(&now), "Mon 19-10-2026");
    }

    #[test]
    fn test_temperature_rounding() {
        assert_eq!(format_temperature(Some(27.6)), "28°C");
        assert_eq!(format_temperature(Some(-0.4)), "0°C");
        assert_eq!(format_temperature(None), "--°C");
    }
}
