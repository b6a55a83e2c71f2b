//! Microphone capture
//!
//! The input callback downmixes each frame to mono and appends it to a
//! bounded [`SampleBuffer`]; the recorder drains that buffer on its own
//! schedule. Frames arriving while the buffer is full are dropped and
//! counted rather than growing memory without limit.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Capture sample rate (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Seconds of audio held between drains before frames are dropped
pub const MAX_BUFFERED_SECS: usize = 10;

/// Bounded mono sample buffer filled from interleaved device frames
#[derive(Debug)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    capacity: usize,
    channels: usize,
    dropped: usize,
}

impl SampleBuffer {
    /// Buffer holding at most `capacity` mono samples from `channels`-wide frames
    #[must_use]
    pub fn new(capacity: usize, channels: u16) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(SAMPLE_RATE as usize)),
            capacity,
            channels: usize::from(channels.max(1)),
            dropped: 0,
        }
    }

    /// Append interleaved frames, averaging channels to mono
    pub fn push_interleaved(&mut self, data: &[f32]) {
        for frame in data.chunks(self.channels) {
            if self.samples.len() >= self.capacity {
                self.dropped += 1;
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            self.samples.push(mono);
        }
    }

    /// Samples currently buffered
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frames dropped since the last drain
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Take everything buffered and reset the drop counter
    pub fn drain(&mut self) -> Vec<f32> {
        if self.dropped > 0 {
            tracing::warn!(dropped = self.dropped, "capture buffer overflowed");
            self.dropped = 0;
        }
        std::mem::take(&mut self.samples)
    }
}

/// Captures mono audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<SampleBuffer>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device at [`SAMPLE_RATE`]
    ///
    /// Prefers a mono configuration; wider ones are downmixed.
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device or it cannot record f32 at 16kHz
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| {
                c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .min_by_key(cpal::SupportedStreamConfigRange::channels)
            .ok_or_else(|| Error::Audio("input device cannot record f32 at 16kHz".to_string()))?
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "input device opened"
        );

        let buffer = SampleBuffer::new(SAMPLE_RATE as usize * MAX_BUFFERED_SECS, config.channels);

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(buffer)),
            stream: None,
        })
    }

    /// Start the input stream; a running stream is left alone
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.push_interleaved(data);
                    }
                },
                |err| tracing::error!(error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop the input stream
    pub fn stop(&mut self) {
        self.stream = None;
    }

    /// Take the samples captured since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain())
            .unwrap_or_default()
    }

    /// Capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(pcm)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }
    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Decode WAV bytes to mono f32 samples, returning the sample rate alongside
///
/// # Errors
///
/// Returns error if the data is not a readable WAV stream
pub fn wav_to_samples(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::new(std::io::Cursor::new(wav))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / 32768.0))
            .collect::<std::result::Result<_, _>>(),
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
    }
    .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;

    let mut mono = SampleBuffer::new(interleaved.len(), spec.channels);
    mono.push_interleaved(&interleaved);

    Ok((mono.drain(), spec.sample_rate))
}
