//! Configuration management for beacon-desk

pub mod file;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;

use crate::hardware::{WiringProfile, default_candidates};
use crate::input::InputCommands;
use crate::voice::{AudioFormat, SttProvider, TtsProvider};
use crate::weather::{OPENWEATHERMAP_URL, WeatherLocation};
use crate::{Error, Result};

use self::file::DeskConfigFile;

/// Default assistant name
pub const DEFAULT_DEVICE_NAME: &str = "Beacon";

/// Exchanges kept for context unless configured otherwise
pub const DEFAULT_MAX_HISTORY_PAIRS: usize = 4;

/// beacon-desk configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub weather: WeatherConfig,
    pub display: DisplayConfig,
    pub network: NetworkConfig,
    pub input: InputConfig,
    pub api_keys: ApiKeys,

    /// Path to data directory (staged audio)
    pub data_dir: PathBuf,
}

/// Assistant identity
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,

    /// Wake phrase, "hey <name>" unless overridden
    pub wake_phrase: String,

    /// Reply shown when only the wake phrase was heard
    pub wake_ack: String,

    /// Persona instruction prepended to the system prompt
    pub system_prompt: Option<String>,

    /// Offset applied to the idle clock
    pub utc_offset: FixedOffset,
}

/// Reply generation configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_history_pairs: NonZeroUsize,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone capture and speech output
    pub enabled: bool,

    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    pub tts_format: AudioFormat,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Push-to-talk recording window
    pub listen_window: Duration,
}

/// Weather source configuration
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// `None` disables weather entirely
    pub location: Option<WeatherLocation>,
    pub lang: String,
    pub base_url: String,
    pub refresh_every: Duration,
    pub timeout: Duration,
}

/// Idle view and panel probing
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub idle_redraw: Duration,
    pub candidates: Vec<WiringProfile>,
}

/// Network transport configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Accept any TLS certificate
    pub insecure_tls: bool,

    /// Upper bound for any single provider request
    pub request_timeout: Duration,

    pub connect_timeout: Duration,

    /// URL checked at startup
    pub connect_probe_url: String,

    pub connect_attempts: u32,
    pub connect_interval: Duration,

    /// Wait before exiting when the network never came up
    pub restart_delay: Duration,
}

/// Where triggers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Lines typed on standard input
    Stdin,
    /// No interactive input; idle view only
    None,
}

impl std::str::FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdin" => Ok(Self::Stdin),
            "none" | "off" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown trigger mode: {other}"))),
        }
    }
}

/// Input trigger configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub trigger: TriggerMode,
    pub commands: InputCommands,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat, Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `OpenWeatherMap` API key
    pub openweathermap: Option<String>,
}

/// Overrides coming from the command line
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Config file to read instead of the standard path
    pub config_path: Option<PathBuf>,

    /// Force voice off regardless of config
    pub disable_voice: bool,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range or cannot be parsed
    pub fn load(options: &LoadOptions) -> Result<Self> {
        let fc = file::load_config_file(options.config_path.as_deref());
        Self::resolve(fc, |key| std::env::var(key).ok(), options.disable_voice)
    }

    /// Merge file values with environment values looked up through `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range or cannot be parsed
    pub fn resolve<F>(fc: DeskConfigFile, lookup: F, disable_voice: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            openweathermap: env("OPENWEATHERMAP_API_KEY").or(fc.api_keys.openweathermap),
        };

        // Device identity
        let name = env("BEACON_DEVICE_NAME")
            .or(fc.device.name)
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        let wake_phrase = env("BEACON_WAKE_PHRASE")
            .or(fc.device.wake_phrase)
            .unwrap_or_else(|| format!("hey {name}"));
        let utc_offset = utc_offset(fc.device.utc_offset_hours.unwrap_or(0.0))?;
        let device = DeviceConfig {
            wake_ack: fc
                .device
                .wake_ack
                .unwrap_or_else(|| "Yes? I'm listening.".to_string()),
            system_prompt: fc.device.system_prompt,
            utc_offset,
            wake_phrase,
            name,
        };

        // LLM
        let max_history_pairs = parse_env(&env, "BEACON_MAX_TURNS")?
            .or(fc.llm.max_history_pairs)
            .unwrap_or(DEFAULT_MAX_HISTORY_PAIRS);
        let max_history_pairs = NonZeroUsize::new(max_history_pairs).ok_or_else(|| {
            Error::Config("max_history_pairs must be at least 1".to_string())
        })?;
        let llm = LlmConfig {
            model: env("BEACON_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: fc
                .llm
                .base_url
                .unwrap_or_else(|| crate::llm::OPENAI_URL.to_string()),
            temperature: fc.llm.temperature.unwrap_or(0.7),
            max_history_pairs,
        };

        // Voice
        let listen_secs = fc.voice.listen_secs.unwrap_or(4.0);
        if !(listen_secs.is_finite() && listen_secs > 0.0) {
            return Err(Error::Config(format!(
                "listen_secs must be positive, got {listen_secs}"
            )));
        }
        let listen_window = Duration::try_from_secs_f32(listen_secs)
            .map_err(|e| Error::Config(format!("listen_secs {listen_secs}: {e}")))?;
        let stt_provider = fc.voice.stt_provider.unwrap_or_default();
        let tts_provider = fc.voice.tts_provider.unwrap_or_default();
        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_provider,
            stt_model: env("BEACON_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            tts_provider,
            tts_model: env("BEACON_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_voice: env("BEACON_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            tts_format: fc.voice.tts_format.unwrap_or_default(),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            listen_window,
        };

        if disable_voice {
            tracing::info!("voice explicitly disabled via --no-voice");
        }

        // Weather
        let lat = parse_env(&env, "BEACON_WEATHER_LAT")?.or(fc.weather.lat);
        let lon = parse_env(&env, "BEACON_WEATHER_LON")?.or(fc.weather.lon);
        let city = env("BEACON_WEATHER_CITY").or(fc.weather.city);
        let country = env("BEACON_WEATHER_COUNTRY").or(fc.weather.country);
        let location = match (lat, lon, city) {
            (Some(lat), Some(lon), _) => Some(WeatherLocation::Coordinates { lat, lon }),
            (_, _, Some(city)) => Some(WeatherLocation::City {
                city,
                country: country.unwrap_or_default(),
            }),
            (Some(_), None, None) | (None, Some(_), None) => {
                return Err(Error::Config(
                    "weather lat and lon must be set together".to_string(),
                ));
            }
            (None, None, None) => None,
        };
        let refresh_secs = parse_env(&env, "BEACON_WEATHER_REFRESH_SECS")?
            .or(fc.weather.refresh_secs)
            .unwrap_or(600);
        if refresh_secs == 0 {
            return Err(Error::Config("weather refresh_secs must be positive".to_string()));
        }
        let weather = WeatherConfig {
            location,
            lang: fc.weather.lang.unwrap_or_else(|| "en".to_string()),
            base_url: fc
                .weather
                .base_url
                .unwrap_or_else(|| OPENWEATHERMAP_URL.to_string()),
            refresh_every: Duration::from_secs(refresh_secs),
            timeout: Duration::from_secs(10),
        };

        // Display
        let idle_redraw_ms = parse_env(&env, "BEACON_IDLE_REDRAW_MS")?
            .or(fc.display.idle_redraw_ms)
            .unwrap_or(1000);
        if idle_redraw_ms == 0 {
            return Err(Error::Config("idle_redraw_ms must be positive".to_string()));
        }
        let candidates = fc
            .display
            .candidates
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_candidates);
        let display = DisplayConfig {
            idle_redraw: Duration::from_millis(idle_redraw_ms),
            candidates,
        };

        // Network
        let insecure_tls = parse_env(&env, "BEACON_INSECURE_TLS")?
            .or(fc.network.insecure_tls)
            .unwrap_or(false);
        let request_timeout_secs = fc.network.request_timeout_secs.unwrap_or(30);
        if request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".to_string()));
        }
        let network = NetworkConfig {
            insecure_tls,
            request_timeout: Duration::from_secs(request_timeout_secs),
            connect_timeout: Duration::from_secs(10),
            connect_probe_url: fc
                .network
                .connect_probe_url
                .unwrap_or_else(|| crate::llm::OPENAI_URL.to_string()),
            connect_attempts: fc.network.connect_attempts.unwrap_or(60).max(1),
            connect_interval: Duration::from_millis(500),
            restart_delay: Duration::from_secs(5),
        };

        // Input
        let trigger = match env("BEACON_TRIGGER").or(fc.input.trigger) {
            Some(mode) => mode.parse()?,
            None => TriggerMode::Stdin,
        };
        let mut commands = InputCommands::default();
        if let Some(talk) = fc.input.talk_command.filter(|t| !t.trim().is_empty()) {
            commands.talk = talk.trim().to_string();
        }
        let input = InputConfig { trigger, commands };

        // Data directory (~/.local/share/omni/beacon-desk on Linux)
        let data_dir = fc.data_dir.unwrap_or_else(default_data_dir);

        Ok(Self {
            device,
            llm,
            voice,
            weather,
            display,
            network,
            input,
            api_keys,
            data_dir,
        })
    }

    /// Directory holding staged audio blobs
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    /// Human readable location label for the idle view
    #[must_use]
    pub fn location_label(&self) -> String {
        self.weather
            .location
            .as_ref()
            .map_or_else(String::new, WeatherLocation::label)
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || Path::new(".").join("beacon-desk"),
        |d| d.data_dir().join("omni").join("beacon-desk"),
    )
}

fn utc_offset(hours: f32) -> Result<FixedOffset> {
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds)
        .ok_or_else(|| Error::Config(format!("utc_offset_hours out of range: {hours}")))
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn resolve(toml: &str, vars: &[(&str, &str)]) -> Result<Config> {
        let fc = file::parse_config(toml).unwrap();
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(fc, |key| vars.get(key).cloned(), false)
    }

    #[test]
    fn test_defaults() {
        let config = resolve("", &[]).unwrap();

        assert_eq!(config.device.name, "Beacon");
        assert_eq!(config.device.wake_phrase, "hey Beacon");
        assert_eq!(config.llm.max_history_pairs.get(), 4);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.display.idle_redraw, Duration::from_secs(1));
        assert_eq!(config.weather.refresh_every, Duration::from_secs(600));
        assert!(config.weather.location.is_none());
        assert_eq!(config.network.connect_attempts, 60);
        assert_eq!(config.network.connect_interval, Duration::from_millis(500));
        assert_eq!(config.input.trigger, TriggerMode::Stdin);
        assert_eq!(config.display.candidates, default_candidates());
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let config = resolve(
            "[device]\nname = \"Orin\"\n[llm]\nmax_history_pairs = 8\n[api_keys]\nopenai = \"file-key\"",
            &[
                ("BEACON_DEVICE_NAME", "Nova"),
                ("OPENAI_API_KEY", "env-key"),
            ],
        )
        .unwrap();

        assert_eq!(config.device.name, "Nova");
        assert_eq!(config.device.wake_phrase, "hey Nova");
        assert_eq!(config.llm.max_history_pairs.get(), 8);
        assert_eq!(config.api_keys.openai.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_blank_env_ignored() {
        let config = resolve("[device]\nname = \"Orin\"", &[("BEACON_DEVICE_NAME", "  ")]).unwrap();
        assert_eq!(config.device.name, "Orin");
    }

    #[test]
    fn test_zero_history_rejected() {
        let err = resolve("", &[("BEACON_MAX_TURNS", "0")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = resolve("[llm]\nmax_history_pairs = 0", &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_listen_window_bounds() {
        let config = resolve("[voice]\nlisten_secs = 2.5", &[]).unwrap();
        assert_eq!(config.voice.listen_window, Duration::from_millis(2500));

        for bad in ["0", "-1.0", "1e30", "inf"] {
            let err = resolve(&format!("[voice]\nlisten_secs = {bad}"), &[]).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "listen_secs = {bad}");
        }
    }

    #[test]
    fn test_speech_models_follow_provider() {
        let config = resolve("", &[]).unwrap();
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert_eq!(config.voice.tts_model, "tts-1");
        assert_eq!(config.voice.tts_voice, "alloy");

        let config = resolve(
            "[voice]\nstt_provider = \"deepgram\"\ntts_provider = \"elevenlabs\"",
            &[],
        )
        .unwrap();
        assert_eq!(config.voice.stt_model, "nova-2");
        assert_eq!(config.voice.tts_model, "eleven_multilingual_v2");
        assert_eq!(config.voice.tts_voice, "21m00Tcm4TlvDq8ikWAM");

        let config = resolve(
            "[voice]\ntts_provider = \"elevenlabs\"\ntts_model = \"eleven_turbo_v2\"",
            &[],
        )
        .unwrap();
        assert_eq!(config.voice.tts_model, "eleven_turbo_v2");
    }

    #[test]
    fn test_zero_redraw_rejected() {
        let err = resolve("[display]\nidle_redraw_ms = 0", &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unparseable_env_rejected() {
        let err = resolve("", &[("BEACON_IDLE_REDRAW_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("BEACON_IDLE_REDRAW_MS"));
    }

    #[test]
    fn test_weather_location() {
        let config = resolve(
            "[weather]\ncity = \"Hanoi\"\ncountry = \"VN\"",
            &[],
        )
        .unwrap();
        assert_eq!(
            config.weather.location,
            Some(WeatherLocation::City {
                city: "Hanoi".to_string(),
                country: "VN".to_string()
            })
        );

        let config = resolve(
            "[weather]\ncity = \"Hanoi\"",
            &[("BEACON_WEATHER_LAT", "21.03"), ("BEACON_WEATHER_LON", "105.85")],
        )
        .unwrap();
        assert!(matches!(
            config.weather.location,
            Some(WeatherLocation::Coordinates { .. })
        ));

        assert!(resolve("[weather]\nlat = 21.0", &[]).is_err());
    }

    #[test]
    fn test_utc_offset() {
        let config = resolve("[device]\nutc_offset_hours = 5.5", &[]).unwrap();
        assert_eq!(config.device.utc_offset.local_minus_utc(), 19_800);

        assert!(resolve("[device]\nutc_offset_hours = 30", &[]).is_err());
    }

    #[test]
    fn test_disable_voice() {
        let fc = file::parse_config("[voice]\nenabled = true").unwrap();
        let config = Config::resolve(fc, |_| None, true).unwrap();
        assert!(!config.voice.enabled);
    }

    #[test]
    fn test_trigger_mode() {
        let config = resolve("[input]\ntrigger = \"none\"\ntalk_command = \"/ptt\"", &[]).unwrap();
        assert_eq!(config.input.trigger, TriggerMode::None);
        assert_eq!(config.input.commands.talk, "/ptt");

        assert!(resolve("", &[("BEACON_TRIGGER", "gpio")]).is_err());
    }
}
