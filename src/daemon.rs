//! Daemon - assembles the desk assistant from configuration
//!
//! Builds the shared HTTP client, the provider clients, the audio devices and
//! the display, then hands them to a [`Session`].

use std::future::Future;
use std::sync::Arc;

use crate::config::TriggerMode;
use crate::display::Display;
use crate::hardware::{PanelDriver, ProbeOutcome, WiringProfile, select_wiring};
use crate::history::TurnHistory;
use crate::idle::{IdleMonitor, IdleSettings};
use crate::input::{ChannelTrigger, TriggerSource, spawn_line_reader};
use crate::llm::{OpenAiChat, ReplyGenerator};
use crate::pipeline::{Collaborators, InteractionPipeline, PipelineSettings};
use crate::session::Session;
use crate::storage::FsBlobStore;
use crate::voice::{
    AudioCapture, AudioInput, AudioOutput, AudioPlayback, SpeechToText, StopFlag, SttProvider,
    Synthesizer, TextToSpeech, Transcriber, TtsProvider,
};
use crate::weather::{OpenWeatherMap, WeatherSource};
use crate::{Config, Result, net};

/// The desk daemon
pub struct Daemon {
    config: Config,
    client: reqwest::Client,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let client = net::build_client(&config.network)?;
        Ok(Self { config, client })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Wait for the network as configured
    ///
    /// # Errors
    ///
    /// Returns `Error::Connectivity` when every attempt failed
    pub async fn ensure_connectivity(&self) -> Result<()> {
        let network = &self.config.network;
        net::wait_for_connectivity(
            &self.client,
            &network.connect_probe_url,
            network.connect_attempts,
            network.connect_interval,
        )
        .await
    }

    /// Chat client; `None` without an `OpenAI` key
    #[must_use]
    pub fn generator(&self) -> Option<Arc<dyn ReplyGenerator>> {
        let llm = &self.config.llm;
        let key = self.config.api_keys.openai.clone().unwrap_or_default();

        match OpenAiChat::new(self.client.clone(), key, llm.model.clone()) {
            Ok(chat) => {
                tracing::info!(model = %llm.model, "reply generator ready");
                Some(Arc::new(
                    chat.with_temperature(llm.temperature)
                        .with_base_url(llm.base_url.clone()),
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "replies disabled");
                None
            }
        }
    }

    /// Speech-to-text client for the configured provider
    #[must_use]
    pub fn transcriber(&self) -> Option<Arc<dyn Transcriber>> {
        let voice = &self.config.voice;
        let keys = &self.config.api_keys;

        let stt = match voice.stt_provider {
            SttProvider::Whisper => SpeechToText::new_whisper(
                self.client.clone(),
                keys.openai.clone().unwrap_or_default(),
                voice.stt_model.clone(),
            ),
            SttProvider::Deepgram => SpeechToText::new_deepgram(
                self.client.clone(),
                keys.deepgram.clone().unwrap_or_default(),
                voice.stt_model.clone(),
            ),
        };

        match stt {
            Ok(stt) => Some(Arc::new(stt)),
            Err(e) => {
                tracing::warn!(error = %e, "speech input disabled");
                None
            }
        }
    }

    /// Text-to-speech client for the configured provider
    #[must_use]
    pub fn synthesizer(&self) -> Option<Arc<dyn Synthesizer>> {
        let voice = &self.config.voice;
        let keys = &self.config.api_keys;

        let tts = match voice.tts_provider {
            TtsProvider::OpenAI => TextToSpeech::new_openai(
                self.client.clone(),
                keys.openai.clone().unwrap_or_default(),
                voice.tts_voice.clone(),
                voice.tts_model.clone(),
                voice.tts_format,
            ),
            TtsProvider::ElevenLabs => TextToSpeech::new_elevenlabs(
                self.client.clone(),
                keys.elevenlabs.clone().unwrap_or_default(),
                voice.tts_voice.clone(),
                voice.tts_model.clone(),
            ),
        };

        match tts {
            Ok(tts) => Some(Arc::new(tts.with_speed(voice.tts_speed))),
            Err(e) => {
                tracing::warn!(error = %e, "speech output disabled");
                None
            }
        }
    }

    /// Weather client; `None` without a location or key
    #[must_use]
    pub fn weather_source(&self) -> Option<Arc<dyn WeatherSource>> {
        let weather = &self.config.weather;
        let location = weather.location.clone()?;
        let key = self.config.api_keys.openweathermap.clone().unwrap_or_default();

        match OpenWeatherMap::new(self.client.clone(), key, location, weather.lang.clone()) {
            Ok(owm) => Some(Arc::new(owm.with_base_url(weather.base_url.clone()))),
            Err(e) => {
                tracing::warn!(error = %e, "weather disabled");
                None
            }
        }
    }

    /// Probe the configured wiring candidates
    pub fn probe_display(&self, driver: &mut dyn PanelDriver) -> ProbeOutcome {
        select_wiring(driver, &self.config.display.candidates)
    }

    /// Assemble a session around `display` and `triggers`
    ///
    /// Audio devices are opened here when voice is enabled; a missing device
    /// only disables that direction.
    ///
    /// # Errors
    ///
    /// Returns error if the staging directory cannot be created
    pub fn build_session(
        &self,
        display: Box<dyn Display>,
        active_wiring: Option<WiringProfile>,
        triggers: Box<dyn TriggerSource>,
        stop: StopFlag,
    ) -> Result<Session> {
        let (input, output) = if self.config.voice.enabled {
            open_audio()
        } else {
            tracing::info!("voice disabled, text only");
            (None, None)
        };

        let collaborators = Collaborators {
            generator: self.generator(),
            transcriber: input.as_ref().and_then(|_| self.transcriber()),
            synthesizer: output.as_ref().and_then(|_| self.synthesizer()),
            input,
            output,
            store: Arc::new(FsBlobStore::open(self.config.staging_dir())?),
        };

        let pipeline = InteractionPipeline::new(
            PipelineSettings::from_config(&self.config),
            collaborators,
            stop,
        );

        let idle = IdleMonitor::new(
            IdleSettings {
                redraw_every: self.config.display.idle_redraw,
                weather_every: self.config.weather.refresh_every,
                weather_timeout: self.config.weather.timeout,
                utc_offset: self.config.device.utc_offset,
            },
            self.weather_source(),
            self.config.location_label(),
        );

        let history = TurnHistory::new(self.config.llm.max_history_pairs);

        Ok(Session::new(
            pipeline,
            history,
            idle,
            display,
            triggers,
            active_wiring,
        ))
    }

    /// Probe the display, build the session and run it until `shutdown`
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be assembled
    pub async fn run<F>(self, driver: &mut dyn PanelDriver, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (wiring, display) = self.probe_display(driver).into_display();

        let stop = StopFlag::new();
        let triggers: Box<dyn TriggerSource> = match self.config.input.trigger {
            TriggerMode::Stdin => Box::new(spawn_line_reader(
                tokio::io::stdin(),
                self.config.input.commands.clone(),
                stop.clone(),
            )),
            TriggerMode::None => Box::new(ChannelTrigger::new().1),
        };

        let mut session = self.build_session(display, wiring, triggers, stop)?;
        let boot = format!("{} ready", self.config.device.name);
        session.boot(&boot).await;

        tracing::info!(
            device = %self.config.device.name,
            wake_phrase = %self.config.device.wake_phrase,
            speech = session.pipeline().accepts_speech(),
            "daemon running"
        );

        session.run(shutdown).await;
        Ok(())
    }
}

fn open_audio() -> (Option<Box<dyn AudioInput>>, Option<Box<dyn AudioOutput>>) {
    let input: Option<Box<dyn AudioInput>> = match AudioCapture::new() {
        Ok(capture) => Some(Box::new(capture)),
        Err(e) => {
            tracing::warn!(error = %e, "no microphone, push-to-talk disabled");
            None
        }
    };

    let output: Option<Box<dyn AudioOutput>> = match AudioPlayback::new() {
        Ok(playback) => Some(Box::new(playback)),
        Err(e) => {
            tracing::warn!(error = %e, "no speaker, replies are text only");
            None
        }
    };

    (input, output)
}
