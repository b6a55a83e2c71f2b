//! Voice processing module
//!
//! Handles microphone capture, end-of-utterance detection and playback.
//! Transcription and synthesis go through the model gateway (see `gateway`).

mod capture;
mod playback;
mod utterance;

use std::path::Path;
use std::time::{Duration, Instant};

pub use capture::{
    AudioCapture, MAX_BUFFERED_SECS, SAMPLE_RATE, SampleBuffer, samples_to_wav, wav_to_samples,
};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use utterance::{DetectorState, UtteranceDetector, calculate_energy};

use crate::Result;
use crate::config::RecordingConfig;

/// Polling interval while waiting for the end of an utterance
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocking record/play contract used by the conversation loop
///
/// Both calls block the calling thread; the session runs them on the
/// blocking pool.
pub trait AudioIo: Send + Sync {
    /// Record one utterance from the microphone into a WAV file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the input device fails or the file cannot be written
    fn record(&self, path: &Path) -> Result<()>;

    /// Play an audio file (MP3 or WAV) through the speakers
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be decoded or the output device fails
    fn play(&self, path: &Path) -> Result<()>;
}

/// Audio I/O on the default system devices
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceAudio {
    recording: RecordingConfig,
}

impl DeviceAudio {
    /// Create device audio with the given recording limits
    #[must_use]
    pub const fn new(recording: RecordingConfig) -> Self {
        Self { recording }
    }
}

impl AudioIo for DeviceAudio {
    fn record(&self, path: &Path) -> Result<()> {
        let mut capture = AudioCapture::new()?;
        let mut detector = UtteranceDetector::new(capture.sample_rate(), self.recording.silence);
        let mut samples = Vec::new();

        capture.start()?;
        let started = Instant::now();

        while !detector.is_complete() && started.elapsed() < self.recording.max_duration {
            std::thread::sleep(POLL_INTERVAL);
            let chunk = capture.drain();
            detector.process(&chunk);
            samples.extend_from_slice(&chunk);
        }

        capture.stop();
        samples.extend_from_slice(&capture.drain());

        if !detector.is_complete() {
            tracing::debug!(
                max_secs = self.recording.max_duration.as_secs(),
                "recording reached maximum duration"
            );
        }

        let wav = samples_to_wav(&samples, capture.sample_rate())?;
        std::fs::write(path, &wav)?;

        tracing::debug!(
            path = %path.display(),
            samples = samples.len(),
            bytes = wav.len(),
            "recording written"
        );
        Ok(())
    }

    fn play(&self, path: &Path) -> Result<()> {
        AudioPlayback::play_file(path)
    }
}
