//! Interaction pipeline
//!
//! One turn runs `Idle → Listening → Transcribing → Generating →
//! Synthesizing → Playing → Idle`. Every collaborator failure is handled
//! where it happens: the turn either shows a visible message and stops, or
//! degrades (text without audio). Nothing but the final text leaves a run.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::display::Display;
use crate::history::TurnHistory;
use crate::llm::{ReplyGenerator, build_system_prompt};
use crate::net::describe_failure;
use crate::storage::BlobStore;
use crate::voice::{
    AudioInput, AudioOutput, SAMPLE_RATE, StopFlag, SynthesizedAudio, Synthesizer, Transcriber,
    WakeMatch, WakePhrase, samples_to_wav,
};

/// Staged microphone recording
pub const CAPTURE_BLOB: &str = "capture.wav";

/// Notice shown in place of the user text for a bare wake phrase
pub const WAKE_NOTICE: &str = "(wake)";

/// Reply shown when no reply generator is configured
pub const NO_API_KEY: &str = "(no API key)";

const LISTENING_NOTICE: &str = "(listening)";

/// Where a turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Listening,
    Transcribing,
    Generating,
    Synthesizing,
    Playing,
    Aborted,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::Generating => "generating",
            Self::Synthesizing => "synthesizing",
            Self::Playing => "playing",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What starts a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInput {
    /// Typed text; used as the transcript
    Text(String),
    /// Record and transcribe speech
    Speech,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Reply shown and played
    Completed,
    /// Reply shown; no audio was produced
    TextOnly,
    /// Only the wake phrase was heard
    WakeOnly,
    /// Capture or transcription failed before a transcript existed
    Aborted,
    /// Reply generation failed; the error text was shown
    GenerationFailed,
}

/// Result of one run, for callers and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Text after wake phrase handling
    pub transcript: Option<String>,
    /// Whatever was shown as the assistant side
    pub reply: Option<String>,
    /// States entered, in order, ending with `Idle`
    pub states: Vec<PipelineState>,
}

impl TurnReport {
    fn new() -> Self {
        Self {
            outcome: TurnOutcome::Completed,
            transcript: None,
            reply: None,
            states: Vec::new(),
        }
    }
}

/// Everything the pipeline talks to
///
/// Optional collaborators degrade the turn when absent: no generator yields a
/// visible notice, no synthesizer or output yields text only, and no
/// microphone or transcriber rejects speech turns.
pub struct Collaborators {
    pub generator: Option<Arc<dyn ReplyGenerator>>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub synthesizer: Option<Arc<dyn Synthesizer>>,
    pub input: Option<Box<dyn AudioInput>>,
    pub output: Option<Box<dyn AudioOutput>>,
    pub store: Arc<dyn BlobStore>,
}

/// Fixed per-session behavior
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub device_name: String,
    pub wake: WakePhrase,
    pub wake_ack: String,
    pub system_prompt: String,
    pub max_pairs: NonZeroUsize,
    pub listen_window: Duration,
}

impl PipelineSettings {
    /// Settings for a device named `device_name` with default wording
    #[must_use]
    pub fn for_device(device_name: &str, max_pairs: NonZeroUsize) -> Self {
        Self {
            device_name: device_name.to_string(),
            wake: WakePhrase::new(&format!("hey {device_name}")),
            wake_ack: "Yes? I'm listening.".to_string(),
            system_prompt: build_system_prompt(device_name, None),
            max_pairs,
            listen_window: Duration::from_secs(4),
        }
    }

    /// Settings derived from loaded configuration
    #[must_use]
    pub fn from_config(config: &crate::config::Config) -> Self {
        let device = &config.device;
        Self {
            device_name: device.name.clone(),
            wake: WakePhrase::new(&device.wake_phrase),
            wake_ack: device.wake_ack.clone(),
            system_prompt: build_system_prompt(&device.name, device.system_prompt.as_deref()),
            max_pairs: config.llm.max_history_pairs,
            listen_window: config.voice.listen_window,
        }
    }
}

/// Runs one turn at a time
pub struct InteractionPipeline {
    settings: PipelineSettings,
    collaborators: Collaborators,
    stop: StopFlag,
    state: PipelineState,
    staged: Vec<String>,
}

impl InteractionPipeline {
    #[must_use]
    pub fn new(settings: PipelineSettings, collaborators: Collaborators, stop: StopFlag) -> Self {
        Self {
            settings,
            collaborators,
            stop,
            state: PipelineState::Idle,
            staged: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Flag that ends a recording or playback early
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Whether speech turns can run
    #[must_use]
    pub const fn accepts_speech(&self) -> bool {
        self.collaborators.input.is_some() && self.collaborators.transcriber.is_some()
    }

    /// Run one turn to completion
    ///
    /// History is only modified when a reply was generated successfully.
    /// Taking `&mut self` keeps turns single-flight.
    pub async fn run(
        &mut self,
        input: TurnInput,
        history: &mut TurnHistory,
        display: &mut dyn Display,
    ) -> TurnReport {
        self.stop.reset();
        let mut report = TurnReport::new();
        let outcome = self.drive(input, history, display, &mut report).await;
        report.outcome = outcome;

        self.discard_staged();
        self.enter(PipelineState::Idle, &mut report);

        tracing::info!(
            outcome = ?report.outcome,
            history = history.len(),
            "turn finished"
        );
        report
    }

    async fn drive(
        &mut self,
        input: TurnInput,
        history: &mut TurnHistory,
        display: &mut dyn Display,
        report: &mut TurnReport,
    ) -> TurnOutcome {
        let raw = match input {
            TurnInput::Text(text) => text,
            TurnInput::Speech => match self.listen(display, report).await {
                Ok(transcript) => transcript,
                Err(message) => {
                    self.enter(PipelineState::Aborted, report);
                    display.draw_chat("", &message);
                    report.reply = Some(message);
                    return TurnOutcome::Aborted;
                }
            },
        };

        let text = match self.settings.wake.strip(&raw) {
            WakeMatch::WakeOnly => {
                tracing::debug!("wake phrase only");
                display.draw_chat(WAKE_NOTICE, &self.settings.wake_ack);
                report.reply = Some(self.settings.wake_ack.clone());
                return TurnOutcome::WakeOnly;
            }
            WakeMatch::Command(text) | WakeMatch::NoWake(text) => text,
        };
        if text.is_empty() {
            self.enter(PipelineState::Aborted, report);
            return TurnOutcome::Aborted;
        }
        report.transcript = Some(text.clone());

        let reply = match self.generate(&text, history, display, report).await {
            Ok(reply) => reply,
            Err(message) => {
                display.draw_chat(&text, &message);
                report.reply = Some(message);
                return TurnOutcome::GenerationFailed;
            }
        };

        history.push_exchange(&text, &reply);
        display.draw_chat(&text, &reply);
        report.reply = Some(reply.clone());

        let Some(audio) = self.synthesize(&reply, report).await else {
            return TurnOutcome::TextOnly;
        };
        self.play(&audio, report).await;

        TurnOutcome::Completed
    }

    /// Record, stage and transcribe; `Err` carries the message to show
    async fn listen(
        &mut self,
        display: &mut dyn Display,
        report: &mut TurnReport,
    ) -> std::result::Result<String, String> {
        let Some(transcriber) = self.collaborators.transcriber.clone() else {
            return Err("(voice input unavailable)".to_string());
        };
        if self.collaborators.input.is_none() {
            return Err("(voice input unavailable)".to_string());
        }

        self.enter(PipelineState::Listening, report);
        display.draw_chat(LISTENING_NOTICE, "");

        let recorded = match self.collaborators.input.as_mut() {
            Some(input) => input.record(self.settings.listen_window, &self.stop).await,
            None => return Err("(voice input unavailable)".to_string()),
        };
        let samples = recorded.map_err(|e| {
            tracing::warn!(error = %e, "recording failed");
            format!("(microphone error: {e})")
        })?;
        if samples.is_empty() {
            return Err("(no audio captured)".to_string());
        }

        let wav = samples_to_wav(&samples, SAMPLE_RATE).map_err(|e| {
            tracing::warn!(error = %e, "wav encoding failed");
            "(audio encoding failed)".to_string()
        })?;
        let wav = self.stage(CAPTURE_BLOB, &wav).map_err(|e| {
            tracing::warn!(error = %e, "cannot stage recording");
            "(storage error)".to_string()
        })?;

        self.enter(PipelineState::Transcribing, report);
        let transcript = transcriber.transcribe(&wav).await.map_err(|e| {
            tracing::warn!(error = %e, "STT failed");
            describe_failure(&e)
        })?;

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err("(didn't catch that)".to_string());
        }

        tracing::info!(transcript = %transcript, "transcribed");
        Ok(transcript)
    }

    /// Ask the generator; `Err` carries the visible failure text
    async fn generate(
        &mut self,
        text: &str,
        history: &TurnHistory,
        display: &mut dyn Display,
        report: &mut TurnReport,
    ) -> std::result::Result<String, String> {
        self.enter(PipelineState::Generating, report);
        display.draw_chat(text, &format!("Asking {}...", self.settings.device_name));

        let Some(generator) = self.collaborators.generator.clone() else {
            tracing::warn!("no reply generator configured");
            return Err(NO_API_KEY.to_string());
        };

        let context = history.snapshot(self.settings.max_pairs.get());
        generator
            .generate(&self.settings.system_prompt, &context, text)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "reply generation failed");
                describe_failure(&e)
            })
    }

    /// Synthesize and stage the reply; `None` means text only
    async fn synthesize(
        &mut self,
        reply: &str,
        report: &mut TurnReport,
    ) -> Option<SynthesizedAudio> {
        if self.collaborators.output.is_none() {
            return None;
        }
        let synthesizer = self.collaborators.synthesizer.clone()?;

        self.enter(PipelineState::Synthesizing, report);
        let audio = match synthesizer.synthesize(reply).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "TTS failed, showing text only");
                return None;
            }
        };

        let name = format!("reply.{}", audio.format.as_str());
        match self.stage(&name, &audio.bytes) {
            Ok(bytes) => Some(SynthesizedAudio {
                bytes,
                format: audio.format,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "cannot stage reply audio, showing text only");
                None
            }
        }
    }

    async fn play(&mut self, audio: &SynthesizedAudio, report: &mut TurnReport) {
        self.enter(PipelineState::Playing, report);
        let Some(output) = self.collaborators.output.as_mut() else {
            return;
        };

        // A stop raised while recording must not cut the reply
        self.stop.reset();
        if let Err(e) = output.play(audio, &self.stop).await {
            tracing::warn!(error = %e, "playback failed");
        } else if self.stop.is_raised() {
            tracing::debug!("playback stopped early");
        }
    }

    /// Write a blob and read it back, so later steps use the staged copy
    fn stage(&mut self, name: &str, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let store = &self.collaborators.store;
        self.staged.push(name.to_string());
        store.write(name, bytes)?;
        store.read(name)
    }

    fn discard_staged(&mut self) {
        for name in self.staged.drain(..) {
            if let Err(e) = self.collaborators.store.remove(&name) {
                tracing::warn!(blob = %name, error = %e, "cannot remove staged audio");
            }
        }
    }

    fn enter(&mut self, state: PipelineState, report: &mut TurnReport) {
        tracing::debug!(from = %self.state, to = %state, "pipeline transition");
        self.state = state;
        report.states.push(state);
    }
}
