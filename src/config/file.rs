//! TOML configuration file loading
//!
//! Supports `~/.config/omni/beacon-desk/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::hardware::WiringProfile;
use crate::voice::{AudioFormat, SttProvider, TtsProvider};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DeskConfigFile {
    #[serde(default)]
    pub device: DeviceFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub weather: WeatherFileConfig,

    #[serde(default)]
    pub display: DisplayFileConfig,

    #[serde(default)]
    pub network: NetworkFileConfig,

    #[serde(default)]
    pub input: InputFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Override for the data directory (staged audio)
    pub data_dir: Option<PathBuf>,
}

/// Assistant identity
#[derive(Debug, Default, Deserialize)]
pub struct DeviceFileConfig {
    /// Name the assistant answers to (e.g. "Beacon")
    pub name: Option<String>,

    /// Full wake phrase; defaults to "hey <name>"
    pub wake_phrase: Option<String>,

    /// Reply shown when only the wake phrase was heard
    pub wake_ack: Option<String>,

    /// Persona instruction prepended to the system prompt
    pub system_prompt: Option<String>,

    /// Clock offset from UTC in hours (e.g. 7 for Indochina time)
    pub utc_offset_hours: Option<f32>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// API root for an OpenAI-compatible server
    pub base_url: Option<String>,

    pub temperature: Option<f32>,

    /// Exchanges kept for context
    pub max_history_pairs: Option<usize>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable microphone capture and speech output
    pub enabled: Option<bool>,

    pub stt_provider: Option<SttProvider>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    pub tts_provider: Option<TtsProvider>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    pub tts_format: Option<AudioFormat>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Push-to-talk recording window in seconds
    pub listen_secs: Option<f32>,
}

/// Weather source configuration
#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,

    /// Language for the place name (e.g. "en", "vi")
    pub lang: Option<String>,

    pub base_url: Option<String>,

    pub refresh_secs: Option<u64>,
}

/// Idle view and panel probing
#[derive(Debug, Default, Deserialize)]
pub struct DisplayFileConfig {
    pub idle_redraw_ms: Option<u64>,

    /// Wiring profiles to probe instead of the built-in list
    pub candidates: Option<Vec<WiringProfile>>,
}

/// Network transport configuration
#[derive(Debug, Default, Deserialize)]
pub struct NetworkFileConfig {
    /// Accept any TLS certificate
    pub insecure_tls: Option<bool>,

    pub request_timeout_secs: Option<u64>,

    /// URL checked at startup before anything else runs
    pub connect_probe_url: Option<String>,

    pub connect_attempts: Option<u32>,
}

/// Input trigger configuration
#[derive(Debug, Default, Deserialize)]
pub struct InputFileConfig {
    /// "stdin" or "none"
    pub trigger: Option<String>,

    /// Line that starts a push-to-talk recording
    pub talk_command: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub openweathermap: Option<String>,
}

/// Load the TOML config file from `path`, or the standard path if `None`
///
/// Returns `DeskConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
pub fn load_config_file(path: Option<&Path>) -> DeskConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return DeskConfigFile::default();
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file");
        return DeskConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                DeskConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DeskConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed or a field has the wrong type
pub fn parse_config(content: &str) -> crate::Result<DeskConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/omni/beacon-desk/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("beacon-desk")
            .join("config.toml")
    })
}
