//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use serde::Deserialize;

use crate::net::check_status;
use crate::{Error, Result};

/// Default `OpenAI` API root
const OPENAI_URL: &str = "https://api.openai.com";

/// Default `ElevenLabs` API root
const ELEVENLABS_URL: &str = "https://api.elevenlabs.io";

/// Container format of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Name used in provider requests and file extensions
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            other => Err(Error::Config(format!("unsupported audio format: {other}"))),
        }
    }
}

/// Playable audio returned by a synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Turns reply text into speech
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize text to playable audio
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or answers non-success
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio>;
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "tts-1",
            Self::ElevenLabs => "eleven_multilingual_v2",
        }
    }

    /// Voice used when none is configured
    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::OpenAI => "alloy",
            // "Rachel", one of the stock ElevenLabs voices
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    format: AudioFormat,
    provider: TtsProvider,
    base_url: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        client: reqwest::Client,
        api_key: String,
        voice: String,
        model: String,
        format: AudioFormat,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client,
            api_key,
            voice,
            speed: 1.0,
            model,
            format,
            provider: TtsProvider::OpenAI,
            base_url: OPENAI_URL.to_string(),
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// ElevenLabs always answers with MP3.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(
        client: reqwest::Client,
        api_key: String,
        voice_id: String,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client,
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            format: AudioFormat::Mp3,
            provider: TtsProvider::ElevenLabs,
            base_url: ELEVENLABS_URL.to_string(),
        })
    }

    /// Set the speed multiplier (`OpenAI` only, 0.25 to 4.0)
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.clamp(0.25, 4.0);
        self
    }

    /// Point at a different API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn provider(&self) -> TtsProvider {
        self.provider
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: self.format.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response)
            .await
            .map_err(|e| Error::Tts(format!("OpenAI {e}")))?;

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response)
            .await
            .map_err(|e| Error::Tts(format!("ElevenLabs {e}")))?;

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        let bytes = match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };

        if bytes.is_empty() {
            return Err(Error::Tts("provider returned no audio".to_string()));
        }

        tracing::debug!(bytes = bytes.len(), format = self.format.as_str(), "speech synthesized");
        Ok(SynthesizedAudio {
            bytes,
            format: self.format,
        })
    }
}
