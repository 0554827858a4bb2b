//! Terminal panel backend
//!
//! Host builds have no SPI or GPIO access, so the round-panel candidates fail
//! to open and the console candidate renders each view as plain text.

use std::io::{self, Write};

use super::{Panel, PanelBus, PanelDriver, WiringProfile};
use crate::display::{Display, format_temperature};
use crate::idle::IdleSnapshot;
use crate::{Error, Result};

/// Wrap width for chat text
const CHAT_WIDTH: usize = 60;

/// Panel driver for hosts without display hardware
#[derive(Debug, Default)]
pub struct ConsoleDriver;

impl ConsoleDriver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PanelDriver for ConsoleDriver {
    fn set_power(&mut self, profile: &WiringProfile, on: bool) -> Result<()> {
        if let Some(bl) = profile.pins().and_then(super::PinMap::backlight) {
            tracing::trace!(pin = bl, on, "no GPIO on this host, backlight unchanged");
        }
        Ok(())
    }

    fn open(&mut self, profile: &WiringProfile) -> Result<Box<dyn Panel>> {
        match &profile.bus {
            PanelBus::Spi { bus, .. } => Err(Error::Display(format!(
                "no SPI panel backend on this host (spi{bus})"
            ))),
            PanelBus::Console => Ok(Box::new(ConsolePanel::new(io::stdout()))),
        }
    }

    fn release(&mut self, profile: &WiringProfile) {
        tracing::trace!(profile = %profile.label, "released");
    }
}

/// Renders views as text lines on a writer
pub struct ConsolePanel<W: Write> {
    out: W,
}

impl<W: Write> ConsolePanel<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the panel and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        let result = writeln!(self.out, "{text}").and_then(|()| self.out.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "console panel write failed");
        }
    }
}

impl<W: Write> Display for ConsolePanel<W> {
    fn draw_boot(&mut self, message: &str) {
        self.emit(&format!("── {message} ──"));
    }

    fn draw_idle(&mut self, snapshot: &IdleSnapshot) {
        let line = format!(
            "[{}] {} · {} {}",
            snapshot.time,
            snapshot.date,
            snapshot.location,
            format_temperature(snapshot.temperature_c)
        );
        self.emit(&line);
    }

    fn draw_chat(&mut self, user_text: &str, assistant_text: &str) {
        let mut frame = String::new();
        for (prefix, text) in [("  > ", user_text), ("  < ", assistant_text)] {
            if text.trim().is_empty() {
                continue;
            }
            for line in wrap(text, CHAT_WIDTH) {
                frame.push_str(prefix);
                frame.push_str(&line);
                frame.push('\n');
            }
        }
        self.emit(frame.trim_end_matches('\n'));
    }
}

impl<W: Write> Panel for ConsolePanel<W> {
    fn self_check(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Greedy word wrap; explicit newlines always break
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() { 0 } else { 1 } + word.chars().count();
            if !line.is_empty() && line.chars().count() + needed > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> IdleSnapshot {
        IdleSnapshot {
            time: "09:05".to_string(),
            date: "Mon 19-10-2026".to_string(),
            location: "Hanoi".to_string(),
            temperature_c: Some(27.6),
            ..IdleSnapshot::default()
        }
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("one two three", 7), ["one two", "three"]);
        assert_eq!(wrap("a\nb", 10), ["a", "b"]);
        assert_eq!(wrap("", 10), [""]);
    }

    #[test]
    fn test_idle_line() {
        let mut panel = ConsolePanel::new(Vec::new());
        panel.draw_idle(&snapshot());

        let out = String::from_utf8(panel.into_inner()).unwrap();
        assert_eq!(out, "[09:05] Mon 19-10-2026 · Hanoi 28°C\n");
    }

    #[test]
    fn test_chat_frame() {
        let mut panel = ConsolePanel::new(Vec::new());
        panel.draw_chat("what time is it", "It is nine.");

        let out = String::from_utf8(panel.into_inner()).unwrap();
        assert_eq!(out, "  > what time is it\n  < It is nine.\n");

        let mut panel = ConsolePanel::new(Vec::new());
        panel.draw_chat("(listening)", "");
        let out = String::from_utf8(panel.into_inner()).unwrap();
        assert_eq!(out, "  > (listening)\n");
    }

    #[test]
    fn test_spi_candidate_rejected_on_host() {
        let mut driver = ConsoleDriver::new();
        let profiles = crate::hardware::default_candidates();

        assert!(driver.open(&profiles[0]).is_err());
        assert!(driver.open(profiles.last().unwrap()).is_ok());
    }
}
