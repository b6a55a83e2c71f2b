//! Audio playback to speakers

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::capture::wav_to_samples;
use crate::{Error, Result};

/// Sample rate for playback (matches OpenAI TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio to the default output device
pub struct AudioPlayback {
    config: StreamConfig,
    sample_rate: u32,
}

impl AudioPlayback {
    /// Create a playback instance at the TTS sample rate
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        Self::with_sample_rate(PLAYBACK_SAMPLE_RATE)
    }

    /// Create a playback instance for a specific sample rate
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn with_sample_rate(sample_rate: u32) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        };

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 1))
            .or_else(|| {
                // Fallback: stereo
                device
                    .supported_output_configs()
                    .ok()?
                    .find(|c| supports(c, 2))
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            sample_rate,
        })
    }

    /// Play an MP3 or WAV file, blocking until playback finishes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, decoded or played
    pub fn play_file(path: &Path) -> Result<()> {
        let data = std::fs::read(path)?;
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

        let (samples, sample_rate) = if is_wav {
            wav_to_samples(&data)?
        } else {
            decode_mp3(&data)?
        };

        tracing::debug!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate,
            "playing audio file"
        );

        Self::with_sample_rate(sample_rate)?.play_samples(&samples)
    }

    /// Play mono f32 samples, blocking until playback finishes
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub fn play_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let channels = usize::from(self.config.channels);
        let shared: Arc<[f32]> = Arc::from(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let shared = Arc::clone(&shared);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = if let Some(&s) = shared.get(pos) {
                                position.store(pos + 1, Ordering::Relaxed);
                                s
                            } else {
                                finished.store(true, Ordering::Release);
                                0.0
                            };

                            frame.fill(sample);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (samples.len() as u64 * 1000) / u64::from(self.sample_rate);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not signal completion, stopping");
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");

        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples, returning the sample rate alongside
///
/// # Errors
///
/// Returns error if the data is not a decodable MP3 stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if let Ok(rate) = u32::try_from(frame.sample_rate) {
                    sample_rate = rate;
                }

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}
