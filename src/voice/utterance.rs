//! End-of-utterance detection
//!
//! Energy-based: a recording is complete once enough speech has been heard
//! and is followed by a stretch of silence.

use std::time::Duration;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech before silence can end the utterance
const MIN_SPEECH: Duration = Duration::from_millis(300);

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Waiting,
    /// Speech heard, accumulating
    Speaking,
    /// Speech followed by enough silence
    Complete,
}

/// Tracks speech activity across consecutive audio chunks
#[derive(Debug)]
pub struct UtteranceDetector {
    state: DetectorState,
    speech_samples: usize,
    silence_samples: usize,
    min_speech_samples: usize,
    end_silence_samples: usize,
}

impl UtteranceDetector {
    /// Create a detector for the given sample rate and trailing silence
    #[must_use]
    pub fn new(sample_rate: u32, end_silence: Duration) -> Self {
        Self {
            state: DetectorState::Waiting,
            speech_samples: 0,
            silence_samples: 0,
            min_speech_samples: samples_for(MIN_SPEECH, sample_rate),
            end_silence_samples: samples_for(end_silence, sample_rate),
        }
    }

    /// Feed one chunk of samples, returning the resulting state
    pub fn process(&mut self, samples: &[f32]) -> DetectorState {
        if samples.is_empty() || self.state == DetectorState::Complete {
            return self.state;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.speech_samples = samples.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech detected");
                }
            }
            DetectorState::Speaking => {
                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                if self.silence_samples >= self.end_silence_samples
                    && self.speech_samples >= self.min_speech_samples
                {
                    tracing::debug!(
                        speech_samples = self.speech_samples,
                        "utterance complete"
                    );
                    self.state = DetectorState::Complete;
                }

                // Too short to count as speech: wait for the next attempt
                if self.silence_samples >= self.end_silence_samples
                    && self.state != DetectorState::Complete
                {
                    tracing::trace!("speech too short, resetting");
                    self.reset();
                }
            }
            DetectorState::Complete => {}
        }

        self.state
    }

    /// Current detector state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Whether an utterance has been captured
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == DetectorState::Complete
    }

    /// Return to waiting for speech
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_samples = 0;
        self.silence_samples = 0;
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}

/// RMS energy of a chunk of samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn tone(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn silence(secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (RATE as f32 * secs) as usize;
        vec![0.0; n]
    }

    #[test]
    fn silence_keeps_waiting() {
        let mut detector = UtteranceDetector::new(RATE, Duration::from_millis(500));
        assert_eq!(detector.process(&silence(2.0)), DetectorState::Waiting);
    }

    #[test]
    fn speech_then_silence_completes() {
        let mut detector = UtteranceDetector::new(RATE, Duration::from_millis(500));

        assert_eq!(detector.process(&tone(0.5)), DetectorState::Speaking);
        assert_eq!(detector.process(&silence(0.3)), DetectorState::Speaking);
        assert_eq!(detector.process(&silence(0.3)), DetectorState::Complete);
        assert!(detector.is_complete());

        // Further audio does not reopen the utterance
        assert_eq!(detector.process(&tone(0.2)), DetectorState::Complete);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut detector = UtteranceDetector::new(RATE, Duration::from_millis(500));

        detector.process(&tone(0.1));
        assert_eq!(detector.state(), DetectorState::Speaking);

        assert_eq!(detector.process(&silence(0.6)), DetectorState::Waiting);
    }

    #[test]
    fn energy_of_silence_is_zero() {
        assert!(calculate_energy(&[]).abs() < f32::EPSILON);
        assert!(calculate_energy(&[0.0; 100]).abs() < f32::EPSILON);
        assert!(calculate_energy(&tone(0.1)) > ENERGY_THRESHOLD);
    }
}
