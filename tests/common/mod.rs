//! Shared test utilities
//!
//! In-memory stand-ins for every collaborator the session talks to. Each fake
//! records what it was asked to do so tests can assert on side effects.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use beacon_desk::display::Display;
use beacon_desk::hardware::{Panel, PanelDriver, WiringProfile};
use beacon_desk::history::ConversationTurn;
use beacon_desk::idle::IdleSnapshot;
use beacon_desk::llm::ReplyGenerator;
use beacon_desk::pipeline::{Collaborators, InteractionPipeline, PipelineSettings};
use beacon_desk::storage::BlobStore;
use beacon_desk::voice::{
    AudioFormat, AudioInput, AudioOutput, StopFlag, SynthesizedAudio, Synthesizer, Transcriber,
};
use beacon_desk::weather::{WeatherReading, WeatherSource};
use beacon_desk::{Error, Result};

// ── Display ────────────────────────────────────────────────────────────────

/// One rendered view
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Boot(String),
    Idle(IdleSnapshot),
    Chat(String, String),
}

/// Display that keeps every frame in a shared log
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl RecordingDisplay {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    /// Assistant side of every chat frame
    pub fn replies(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                Frame::Chat(_, reply) => Some(reply),
                _ => None,
            })
            .collect()
    }

    pub fn last_chat(&self) -> Option<(String, String)> {
        self.frames().into_iter().rev().find_map(|f| match f {
            Frame::Chat(user, reply) => Some((user, reply)),
            _ => None,
        })
    }

    pub fn idle_count(&self) -> usize {
        self.frames()
            .iter()
            .filter(|f| matches!(f, Frame::Idle(_)))
            .count()
    }
}

impl Display for RecordingDisplay {
    fn draw_boot(&mut self, message: &str) {
        self.frames.lock().unwrap().push(Frame::Boot(message.to_string()));
    }

    fn draw_idle(&mut self, snapshot: &IdleSnapshot) {
        self.frames.lock().unwrap().push(Frame::Idle(snapshot.clone()));
    }

    fn draw_chat(&mut self, user_text: &str, assistant_text: &str) {
        self.frames
            .lock()
            .unwrap()
            .push(Frame::Chat(user_text.to_string(), assistant_text.to_string()));
    }
}

// ── Hardware ───────────────────────────────────────────────────────────────

/// Shared bookkeeping of a fake driver
#[derive(Debug, Default)]
pub struct DriverLog {
    pub opened: Vec<String>,
    pub released: Vec<String>,
    pub powered_on: Vec<String>,
    /// Labels with an open bus that was not released
    pub held: HashSet<String>,
    /// Panels constructed and not yet dropped
    pub live_panels: usize,
}

/// How a candidate behaves when probed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Works,
    FailsOpen,
    FailsSelfCheck,
}

/// Driver whose candidates succeed or fail by label
#[derive(Debug, Default)]
pub struct FakeDriver {
    behaviors: HashMap<String, Behavior>,
    pub log: Arc<Mutex<DriverLog>>,
}

impl FakeDriver {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(label, b)| ((*label).to_string(), *b))
                .collect(),
            log: Arc::default(),
        }
    }

    fn behavior(&self, profile: &WiringProfile) -> Behavior {
        self.behaviors
            .get(&profile.label)
            .copied()
            .unwrap_or(Behavior::FailsOpen)
    }
}

impl PanelDriver for FakeDriver {
    fn set_power(&mut self, profile: &WiringProfile, on: bool) -> Result<()> {
        if on {
            self.log.lock().unwrap().powered_on.push(profile.label.clone());
        }
        Ok(())
    }

    fn open(&mut self, profile: &WiringProfile) -> Result<Box<dyn Panel>> {
        let behavior = self.behavior(profile);
        let mut log = self.log.lock().unwrap();
        log.opened.push(profile.label.clone());

        if behavior == Behavior::FailsOpen {
            return Err(Error::Display(format!("{} did not respond", profile.label)));
        }

        log.held.insert(profile.label.clone());
        log.live_panels += 1;
        Ok(Box::new(FakePanel {
            fail_check: behavior == Behavior::FailsSelfCheck,
            log: Arc::clone(&self.log),
            display: RecordingDisplay::default(),
        }))
    }

    fn release(&mut self, profile: &WiringProfile) {
        let mut log = self.log.lock().unwrap();
        log.released.push(profile.label.clone());
        log.held.remove(&profile.label);
    }
}

struct FakePanel {
    fail_check: bool,
    log: Arc<Mutex<DriverLog>>,
    display: RecordingDisplay,
}

impl Drop for FakePanel {
    fn drop(&mut self) {
        self.log.lock().unwrap().live_panels -= 1;
    }
}

impl Display for FakePanel {
    fn draw_boot(&mut self, message: &str) {
        self.display.draw_boot(message);
    }

    fn draw_idle(&mut self, snapshot: &IdleSnapshot) {
        self.display.draw_idle(snapshot);
    }

    fn draw_chat(&mut self, user_text: &str, assistant_text: &str) {
        self.display.draw_chat(user_text, assistant_text);
    }
}

impl Panel for FakePanel {
    fn self_check(&mut self) -> Result<()> {
        if self.fail_check {
            return Err(Error::Display("self check failed".to_string()));
        }
        Ok(())
    }
}

/// SPI profile with a distinct pin set per label
pub fn profile(label: &str) -> WiringProfile {
    WiringProfile::spi(
        label,
        beacon_desk::hardware::PinMap {
            sck: 1,
            mosi: 2,
            miso: -1,
            dc: 3,
            cs: 4,
            rst: 5,
            bl: -1,
        },
    )
}

// ── Reply generation ───────────────────────────────────────────────────────

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub user_text: String,
}

/// Generator that replays scripted answers, then echoes
#[derive(Default)]
pub struct FakeGenerator {
    script: Mutex<VecDeque<Result<String>>>,
    pub calls: Mutex<Vec<GenerateCall>>,
}

impl FakeGenerator {
    pub fn replying(replies: &[&str]) -> Arc<Self> {
        let generator = Self::default();
        generator
            .script
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Ok((*r).to_string())));
        Arc::new(generator)
    }

    pub fn failing(error: Error) -> Arc<Self> {
        let generator = Self::default();
        generator.script.lock().unwrap().push_back(Err(error));
        Arc::new(generator)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Option<GenerateCall> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ReplyGenerator for FakeGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_text: &str,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(GenerateCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            user_text: user_text.to_string(),
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo: {user_text}")))
    }
}

// ── Speech ─────────────────────────────────────────────────────────────────

/// Transcriber returning a fixed result
pub struct FakeTranscriber {
    result: std::result::Result<String, String>,
    pub received: Mutex<Vec<Vec<u8>>>,
}

impl FakeTranscriber {
    pub fn hearing(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
            received: Mutex::default(),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            received: Mutex::default(),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        self.received.lock().unwrap().push(wav.to_vec());
        self.result.clone().map_err(Error::Stt)
    }
}

/// Synthesizer that succeeds with a few bytes or always fails
pub struct FakeSynth {
    fail: bool,
    pub calls: AtomicUsize,
}

impl FakeSynth {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Synthesizer for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Tts("HTTP 500: synth down".to_string()));
        }
        Ok(SynthesizedAudio {
            bytes: text.as_bytes().to_vec(),
            format: AudioFormat::Mp3,
        })
    }
}

/// Microphone returning fixed samples
pub struct FakeInput {
    samples: Option<Vec<f32>>,
    pub recordings: Arc<AtomicUsize>,
}

impl FakeInput {
    pub fn with_samples(samples: Vec<f32>) -> Self {
        Self {
            samples: Some(samples),
            recordings: Arc::default(),
        }
    }

    pub fn broken() -> Self {
        Self {
            samples: None,
            recordings: Arc::default(),
        }
    }
}

#[async_trait(?Send)]
impl AudioInput for FakeInput {
    async fn record(&mut self, _window: Duration, _stop: &StopFlag) -> Result<Vec<f32>> {
        self.recordings.fetch_add(1, Ordering::SeqCst);
        self.samples
            .clone()
            .ok_or_else(|| Error::Audio("device unplugged".to_string()))
    }
}

/// Speaker counting playback calls
#[derive(Clone, Default)]
pub struct FakeOutput {
    pub plays: Arc<AtomicUsize>,
    pub played: Arc<Mutex<Vec<SynthesizedAudio>>>,
    broken: bool,
}

impl FakeOutput {
    /// Speaker whose device fails partway through every reply
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl AudioOutput for FakeOutput {
    async fn play(&mut self, audio: &SynthesizedAudio, _stop: &StopFlag) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(Error::Audio("output stream closed".to_string()));
        }
        self.played.lock().unwrap().push(audio.clone());
        Ok(())
    }
}

// ── Storage ────────────────────────────────────────────────────────────────

/// In-memory blob store
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    /// Blob names that fail to write
    fail_writes: Mutex<HashSet<String>>,
    pub written: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn failing_on(names: &[&str]) -> Arc<Self> {
        let store = Self::default();
        store
            .fail_writes
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| (*n).to_string()));
        Arc::new(store)
    }

    pub fn names(&self) -> Vec<String> {
        self.blobs.lock().unwrap().keys().cloned().collect()
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

impl BlobStore for MemoryStore {
    fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_writes.lock().unwrap().contains(name) {
            return Err(Error::Storage(format!("disk full writing {name}")));
        }
        self.written.lock().unwrap().push(name.to_string());
        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("{name} not found")))
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }
}

// ── Weather ────────────────────────────────────────────────────────────────

/// Weather source replaying scripted results; repeats the last one
pub struct FakeWeather {
    script: Mutex<VecDeque<std::result::Result<WeatherReading, String>>>,
    pub calls: AtomicUsize,
}

impl FakeWeather {
    pub fn scripted(results: Vec<std::result::Result<WeatherReading, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WeatherSource for FakeWeather {
    async fn fetch(&self) -> Result<WeatherReading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        next.unwrap_or_else(|| Err("no script".to_string()))
            .map_err(Error::Weather)
    }
}

/// Answers the first fetch, then never answers again
pub struct StallingWeather {
    first: WeatherReading,
    pub calls: AtomicUsize,
}

impl StallingWeather {
    pub fn after(first: WeatherReading) -> Arc<Self> {
        Arc::new(Self {
            first,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WeatherSource for StallingWeather {
    async fn fetch(&self) -> Result<WeatherReading> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(self.first.clone());
        }
        std::future::pending().await
    }
}

pub fn reading(place: &str, temperature_c: f32) -> WeatherReading {
    WeatherReading {
        place: place.to_string(),
        temperature_c,
    }
}

// ── Pipeline assembly ──────────────────────────────────────────────────────

pub fn pairs(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

/// Text-only collaborators around `generator`
pub fn text_collaborators(
    generator: Arc<FakeGenerator>,
    store: Arc<MemoryStore>,
) -> Collaborators {
    Collaborators {
        generator: Some(generator),
        transcriber: None,
        synthesizer: None,
        input: None,
        output: None,
        store,
    }
}

/// Pipeline for a device named "Assistant"
pub fn pipeline(collaborators: Collaborators, max_pairs: usize) -> InteractionPipeline {
    InteractionPipeline::new(
        PipelineSettings::for_device("Assistant", pairs(max_pairs)),
        collaborators,
        StopFlag::new(),
    )
}
