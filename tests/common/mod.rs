//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tutor::config::SessionConfig;
use tutor::session::{Turn, TurnStage};
use tutor::voice::{SAMPLE_RATE, samples_to_wav};
use tutor::{AudioIo, Error, ModelGateway, Result};

/// Transcript returned once the scripted ones run out
pub const DEFAULT_TRANSCRIPT: &str = "I don't know where to start";

/// Reply returned once the scripted ones run out
pub const DEFAULT_REPLY: &str = "Let's start by looking at what the problem asks.";

type CompleteHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Model gateway returning scripted answers and recording every request
pub struct ScriptedGateway {
    analysis: String,
    transcripts: Mutex<VecDeque<String>>,
    replies: Mutex<VecDeque<String>>,
    fail_at: Mutex<Option<TurnStage>>,
    on_complete: Mutex<Option<CompleteHook>>,
    pub analysis_requests: Mutex<Vec<(String, String, u32)>>,
    pub transcribed: Mutex<Vec<usize>>,
    pub completions: Mutex<Vec<Vec<Turn>>>,
    pub synthesized: Mutex<Vec<(String, String)>>,
}

impl ScriptedGateway {
    pub fn new(analysis: &str) -> Self {
        Self {
            analysis: analysis.to_string(),
            transcripts: Mutex::new(VecDeque::new()),
            replies: Mutex::new(VecDeque::new()),
            fail_at: Mutex::new(None),
            on_complete: Mutex::new(None),
            analysis_requests: Mutex::new(Vec::new()),
            transcribed: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
            synthesized: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_transcripts(self, transcripts: &[&str]) -> Self {
        *self.transcripts.lock().unwrap() = transcripts.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_replies(self, replies: &[&str]) -> Self {
        *self.replies.lock().unwrap() = replies.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn failing_at(self, stage: TurnStage) -> Self {
        *self.fail_at.lock().unwrap() = Some(stage);
        self
    }

    /// Run `hook` with the 1-based call number during each completion
    pub fn on_complete(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_complete.lock().unwrap() = Some(Arc::new(hook));
    }

    fn check(&self, stage: TurnStage, error: impl FnOnce() -> Error) -> Result<()> {
        if *self.fail_at.lock().unwrap() == Some(stage) {
            return Err(error());
        }
        Ok(())
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn analyze_image(
        &self,
        image_data_uri: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        self.analysis_requests.lock().unwrap().push((
            image_data_uri.to_string(),
            prompt.to_string(),
            max_tokens,
        ));
        self.check(TurnStage::Analyze, || {
            Error::Vision("vision API error 401 Unauthorized: invalid key".to_string())
        })?;
        Ok(self.analysis.clone())
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        self.transcribed.lock().unwrap().push(audio.len());
        self.check(TurnStage::Transcribe, || {
            Error::Stt("transcription API error 429 Too Many Requests: rate limited".to_string())
        })?;
        Ok(self
            .transcripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DEFAULT_TRANSCRIPT.to_string()))
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let call = {
            let mut completions = self.completions.lock().unwrap();
            completions.push(turns.to_vec());
            completions.len()
        };

        let hook = self.on_complete.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(call);
        }

        self.check(TurnStage::Complete, || {
            Error::Chat("chat API error 500 Internal Server Error: oops".to_string())
        })?;
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DEFAULT_REPLY.to_string()))
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        self.synthesized
            .lock()
            .unwrap()
            .push((text.to_string(), voice.to_string()));
        self.check(TurnStage::Synthesize, || {
            Error::Tts("TTS API error 503 Service Unavailable: busy".to_string())
        })?;
        Ok(format!("mp3:{text}").into_bytes())
    }
}

/// Audio I/O that writes a short silent WAV and remembers what it played
#[derive(Default)]
pub struct ScriptedAudio {
    pub recordings: AtomicUsize,
    pub played: Mutex<Vec<Vec<u8>>>,
    pub fail_playback: bool,
}

impl ScriptedAudio {
    pub fn failing_playback() -> Self {
        Self {
            fail_playback: true,
            ..Self::default()
        }
    }

    pub fn recordings(&self) -> usize {
        self.recordings.load(Ordering::SeqCst)
    }

    pub fn played(&self) -> Vec<Vec<u8>> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioIo for ScriptedAudio {
    fn record(&self, path: &Path) -> Result<()> {
        let wav = samples_to_wav(&[0.0; 1600], SAMPLE_RATE)?;
        std::fs::write(path, wav)?;
        self.recordings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self, path: &Path) -> Result<()> {
        if self.fail_playback {
            return Err(Error::Audio("no output device available".to_string()));
        }
        let bytes = std::fs::read(path)?;
        self.played.lock().unwrap().push(bytes);
        Ok(())
    }
}

/// Session config rooted in a temporary directory
pub fn scratch_config(dir: &Path, retain: bool) -> SessionConfig {
    SessionConfig {
        scratch_dir: dir.to_path_buf(),
        retain_artifacts: retain,
    }
}

/// Minimal PNG signature, enough for upload and data URI tests
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
