//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::StopFlag;
use super::tts::{AudioFormat, SynthesizedAudio};
use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Interval between completion/stop checks while playing
const PLAYBACK_POLL: Duration = Duration::from_millis(50);

/// Sink for synthesized speech
///
/// Not `Send`: cpal streams are bound to the thread that created them.
#[async_trait(?Send)]
pub trait AudioOutput {
    /// Play to completion, or until `stop` is raised
    ///
    /// # Errors
    ///
    /// Returns error if decoding or the output device fails
    async fn play(&mut self, audio: &SynthesizedAudio, stop: &StopFlag) -> Result<()>;
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play raw f32 samples
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play_samples(&mut self, samples: Vec<f32>, stop: &StopFlag) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position_cb.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        let sample = samples_cb.get(pos).copied().unwrap_or_else(|| {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        });

                        for out in frame.iter_mut() {
                            *out = sample;
                        }

                        if pos < samples_cb.len() {
                            pos += 1;
                        }
                    }

                    position_cb.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let start = Instant::now();
        let timeout = Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Relaxed) {
            if stop.is_raised() {
                tracing::info!("playback stopped");
                break;
            }
            if start.elapsed() > timeout {
                break;
            }
            tokio::time::sleep(PLAYBACK_POLL).await;
        }

        // Small delay to ensure audio finishes
        tokio::time::sleep(Duration::from_millis(100)).await;

        drop(stream);
        tracing::debug!(
            samples = sample_count,
            played = position.load(Ordering::Relaxed),
            "playback complete"
        );

        Ok(())
    }
}

#[async_trait(?Send)]
impl AudioOutput for AudioPlayback {
    async fn play(&mut self, audio: &SynthesizedAudio, stop: &StopFlag) -> Result<()> {
        stop.reset();
        let samples = decode(audio)?;
        self.play_samples(samples, stop).await
    }
}

/// Decode synthesized audio into mono f32 samples
///
/// # Errors
///
/// Returns error if the bytes are not valid for the declared format
pub fn decode(audio: &SynthesizedAudio) -> Result<Vec<f32>> {
    match audio.format {
        AudioFormat::Mp3 => decode_mp3(&audio.bytes),
        AudioFormat::Wav => decode_wav(&audio.bytes),
    }
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

/// Decode WAV bytes to f32 samples, averaging channels down to mono
fn decode_wav(wav_data: &[u8]) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    if spec.sample_rate != PLAYBACK_SAMPLE_RATE {
        tracing::debug!(
            sample_rate = spec.sample_rate,
            expected = PLAYBACK_SAMPLE_RATE,
            "WAV sample rate differs from output rate"
        );
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(mono)
}
