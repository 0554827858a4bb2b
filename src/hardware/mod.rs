//! Display hardware auto-probe
//!
//! The device ships with several possible panel wirings. At boot each
//! candidate is tried once, in order, and the first one that passes its
//! self-check is kept for the lifetime of the process. Failed candidates are
//! released before the next one is tried, so at most one panel ever holds
//! resources.

mod console;

use std::fmt;

use serde::Deserialize;

pub use console::{ConsoleDriver, ConsolePanel};

use crate::display::{Display, HeadlessDisplay};
use crate::idle::IdleSnapshot;
use crate::Result;

/// Pin number meaning "not wired"
pub const NO_PIN: i32 = -1;

/// SPI pin assignment for one panel wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PinMap {
    pub sck: i32,
    pub mosi: i32,
    #[serde(default = "no_pin")]
    pub miso: i32,
    pub dc: i32,
    pub cs: i32,
    pub rst: i32,
    #[serde(default = "no_pin")]
    pub bl: i32,
}

const fn no_pin() -> i32 {
    NO_PIN
}

impl PinMap {
    /// Backlight pin, if one is wired
    #[must_use]
    pub const fn backlight(&self) -> Option<i32> {
        if self.bl >= 0 { Some(self.bl) } else { None }
    }
}

/// How a candidate panel is attached
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PanelBus {
    /// Round SPI panel on the given bus
    Spi {
        #[serde(default)]
        bus: u8,
        #[serde(flatten)]
        pins: PinMap,
    },
    /// Text rendering on the controlling terminal
    Console,
}

/// One candidate hardware configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WiringProfile {
    /// Human readable name, shown in probe logs
    pub label: String,
    #[serde(flatten)]
    pub bus: PanelBus,
}

impl WiringProfile {
    /// SPI candidate on bus 0
    #[must_use]
    pub fn spi(label: impl Into<String>, pins: PinMap) -> Self {
        Self {
            label: label.into(),
            bus: PanelBus::Spi { bus: 0, pins },
        }
    }

    /// Terminal candidate
    #[must_use]
    pub fn console(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bus: PanelBus::Console,
        }
    }

    /// Pin map for SPI candidates
    #[must_use]
    pub const fn pins(&self) -> Option<&PinMap> {
        match &self.bus {
            PanelBus::Spi { pins, .. } => Some(pins),
            PanelBus::Console => None,
        }
    }
}

impl fmt::Display for WiringProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bus {
            PanelBus::Spi { bus, pins } => write!(
                f,
                "{} (spi{bus} SCK={} MOSI={} DC={} CS={} RST={} BL={})",
                self.label, pins.sck, pins.mosi, pins.dc, pins.cs, pins.rst, pins.bl
            ),
            PanelBus::Console => write!(f, "{} (console)", self.label),
        }
    }
}

/// Built-in candidate list: the known round-panel wirings, then the terminal
#[must_use]
pub fn default_candidates() -> Vec<WiringProfile> {
    let spi = |label: &str, sck, mosi, dc, cs, rst, bl| {
        WiringProfile::spi(
            label,
            PinMap {
                sck,
                mosi,
                miso: NO_PIN,
                dc,
                cs,
                rst,
                bl,
            },
        )
    };

    vec![
        spi("S3-Round(1)", 36, 35, 7, 6, 5, 10),
        spi("XiaoZhi-like", 12, 11, 9, 10, 8, 14),
        spi("S3-Dev-Alt", 40, 41, 38, 39, 42, 45),
        spi("S3-HiPins", 48, 47, 38, 39, 40, 45),
        WiringProfile::console("Console"),
    ]
}

/// An initialized panel
pub trait Panel: Display {
    /// Verify the panel responds; must succeed before the panel is used
    ///
    /// # Errors
    ///
    /// Returns error if the panel does not answer
    fn self_check(&mut self) -> Result<()>;
}

/// Hardware access used by the probe
pub trait PanelDriver {
    /// Drive the panel's power/backlight rail
    ///
    /// # Errors
    ///
    /// Returns error if the rail cannot be driven
    fn set_power(&mut self, profile: &WiringProfile, on: bool) -> Result<()>;

    /// Construct a panel for the candidate
    ///
    /// # Errors
    ///
    /// Returns error if the bus cannot be opened for this wiring
    fn open(&mut self, profile: &WiringProfile) -> Result<Box<dyn Panel>>;

    /// Free anything still held for a rejected candidate
    fn release(&mut self, profile: &WiringProfile);
}

/// The selected wiring and its live panel
pub struct ActiveDisplay {
    pub profile: WiringProfile,
    panel: Box<dyn Panel>,
}

impl fmt::Debug for ActiveDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveDisplay")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Display for ActiveDisplay {
    fn draw_boot(&mut self, message: &str) {
        self.panel.draw_boot(message);
    }

    fn draw_idle(&mut self, snapshot: &IdleSnapshot) {
        self.panel.draw_idle(snapshot);
    }

    fn draw_chat(&mut self, user_text: &str, assistant_text: &str) {
        self.panel.draw_chat(user_text, assistant_text);
    }
}

/// Result of the boot probe
#[derive(Debug)]
pub enum ProbeOutcome {
    Found(ActiveDisplay),
    NotFound,
}

impl ProbeOutcome {
    /// Selected profile, if any
    #[must_use]
    pub const fn profile(&self) -> Option<&WiringProfile> {
        match self {
            Self::Found(active) => Some(&active.profile),
            Self::NotFound => None,
        }
    }

    /// Turn the outcome into something drawable, headless when nothing was found
    #[must_use]
    pub fn into_display(self) -> (Option<WiringProfile>, Box<dyn Display>) {
        match self {
            Self::Found(active) => (Some(active.profile.clone()), Box::new(active)),
            Self::NotFound => (None, Box::new(HeadlessDisplay)),
        }
    }
}

/// Try each candidate once, in order, keeping the first that initializes
pub fn select_wiring(driver: &mut dyn PanelDriver, candidates: &[WiringProfile]) -> ProbeOutcome {
    tracing::info!(candidates = candidates.len(), "probing display wiring");

    for profile in candidates {
        match try_candidate(driver, profile) {
            Ok(panel) => {
                tracing::info!(profile = %profile, "display initialized");
                return ProbeOutcome::Found(ActiveDisplay {
                    profile: profile.clone(),
                    panel,
                });
            }
            Err(e) => {
                driver.release(profile);
                tracing::debug!(profile = %profile, error = %e, "display candidate failed");
            }
        }
    }

    tracing::warn!("no display candidate worked, continuing headless");
    ProbeOutcome::NotFound
}

fn try_candidate(driver: &mut dyn PanelDriver, profile: &WiringProfile) -> Result<Box<dyn Panel>> {
    driver.set_power(profile, false)?;
    let mut panel = driver.open(profile)?;
    panel.self_check()?;
    driver.set_power(profile, true)?;
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_candidates_end_with_console() {
        let candidates = default_candidates();
        assert_eq!(candidates.len(), 5);
        assert_eq!(candidates[0].label, "S3-Round(1)");
        assert_eq!(candidates.last().unwrap().bus, PanelBus::Console);
    }

    #[test]
    fn test_backlight_pin() {
        let candidates = default_candidates();
        assert_eq!(candidates[1].pins().unwrap().backlight(), Some(14));

        let mut pins = *candidates[1].pins().unwrap();
        pins.bl = NO_PIN;
        assert_eq!(pins.backlight(), None);
    }

    #[test]
    fn test_profile_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            candidates: Vec<WiringProfile>,
        }

        let parsed: Wrapper = toml::from_str(
            r#"
            [[candidates]]
            label = "Bench"
            kind = "spi"
            bus = 1
            sck = 12
            mosi = 11
            dc = 9
            cs = 10
            rst = 8

            [[candidates]]
            label = "Term"
            kind = "console"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.candidates.len(), 2);
        let pins = parsed.candidates[0].pins().unwrap();
        assert_eq!(pins.miso, NO_PIN);
        assert_eq!(pins.backlight(), None);
        assert_eq!(parsed.candidates[1].bus, PanelBus::Console);
    }
}
