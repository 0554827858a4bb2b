//! Voice processing module
//!
//! Audio capture and playback devices, the remote STT/TTS providers, and
//! wake phrase handling for transcripts.

mod capture;
mod playback;
mod stt;
mod tts;
mod wake_phrase;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use capture::{AudioCapture, AudioInput, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioOutput, AudioPlayback, decode};
pub use stt::{SpeechToText, SttProvider, Transcriber};
pub use tts::{AudioFormat, SynthesizedAudio, Synthesizer, TextToSpeech, TtsProvider};
pub use wake_phrase::{WakeMatch, WakePhrase};

/// Shared request to end a recording or playback early
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running recording/playback to end
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
