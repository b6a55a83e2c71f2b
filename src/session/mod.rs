//! Conversation session
//!
//! Drives one tutoring conversation: analyze the uploaded image, seed the
//! context, then loop record → transcribe → complete → synthesize → play
//! until the stop token is cancelled or an external call fails.
//!
//! Steps within a turn run strictly in order. Blocking audio work runs on
//! the blocking pool so the async runtime serving the UI stays responsive.
//! Stopping is cooperative: the token is checked before each turn, so a
//! turn in progress always finishes (including playback).

mod context;
mod events;
mod image;
mod scratch;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use context::{ConversationContext, Role, SEED_TURNS, Speaker, TranscriptLine, Turn, system_prompt};
pub use events::{EVENT_CAPACITY, SessionEvent};
pub use image::{ImageKind, UploadedImage};
pub use scratch::{RECORDING_FILE, SPEECH_FILE, ScratchSpace};
pub use state::{SessionState, TurnStage};

use crate::config::{Config, SessionConfig};
use crate::gateway::ModelGateway;
use crate::voice::AudioIo;
use crate::{Error, Result};

/// Per-session conversation settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub analysis_prompt: String,
    pub analysis_max_tokens: u32,
    pub instructions: String,
    pub greeting: String,
    pub voice: String,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            analysis_prompt: config.prompts.analysis.clone(),
            analysis_max_tokens: config.models.analysis_max_tokens,
            instructions: config.prompts.instructions.clone(),
            greeting: config.prompts.greeting.clone(),
            voice: config.models.voice.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        let prompts = crate::config::PromptConfig::default();
        let models = crate::config::ModelConfig::default();
        Self {
            analysis_prompt: prompts.analysis,
            analysis_max_tokens: models.analysis_max_tokens,
            instructions: prompts.instructions,
            greeting: prompts.greeting,
            voice: models.voice,
        }
    }
}

/// Shared view of a session: state, stop signal and conversation
///
/// The controller and the UI hold this handle; only the session loop
/// mutates the conversation.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    state: RwLock<SessionState>,
    stop: CancellationToken,
    context: RwLock<Option<ConversationContext>>,
    analysis: RwLock<Option<String>>,
    transcript: RwLock<Vec<TranscriptLine>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    fn new(id: Uuid, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            id,
            state: RwLock::new(SessionState::Idle),
            stop: CancellationToken::new(),
            context: RwLock::new(None),
            analysis: RwLock::new(None),
            transcript: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Request the loop to stop after the turn in progress
    ///
    /// Returns false if a stop was already requested.
    pub fn stop(&self) -> bool {
        if self.stop.is_cancelled() {
            return false;
        }

        self.stop.cancel();
        tracing::info!(session_id = %self.id, "stop requested");
        true
    }

    /// Whether a stop has been requested
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Token cancelled when a stop is requested
    #[must_use]
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Snapshot of the conversation context, once seeded
    pub async fn context(&self) -> Option<ConversationContext> {
        self.context.read().await.clone()
    }

    /// Image analysis text, once available
    pub async fn analysis(&self) -> Option<String> {
        self.analysis.read().await.clone()
    }

    /// Transcript lines shown to the user so far
    pub async fn transcript(&self) -> Vec<TranscriptLine> {
        self.transcript.read().await.clone()
    }

    async fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.write().await;
        if !state.can_transition_to(&next) {
            tracing::warn!(
                session_id = %self.id,
                from = ?*state,
                to = ?next,
                "ignoring illegal state transition"
            );
            return false;
        }

        tracing::info!(session_id = %self.id, from = ?*state, to = ?next, "session state changed");
        state.clone_from(&next);
        drop(state);

        let _ = self.events.send(SessionEvent::state(self.id, next));
        true
    }

    async fn seed(&self, analysis: String, settings: &SessionSettings) {
        let context =
            ConversationContext::seeded(&analysis, &settings.instructions, &settings.greeting);
        *self.context.write().await = Some(context);
        *self.analysis.write().await = Some(analysis.clone());

        let _ = self.events.send(SessionEvent::Analysis {
            session_id: self.id,
            text: analysis,
        });
    }

    async fn turns(&self) -> Result<Vec<Turn>> {
        self.context
            .read()
            .await
            .as_ref()
            .map(|c| c.turns().to_vec())
            .ok_or_else(|| Error::Session("conversation not seeded".to_string()))
    }

    async fn append(&self, role: Role, text: String) -> Result<()> {
        {
            let mut guard = self.context.write().await;
            let context = guard
                .as_mut()
                .ok_or_else(|| Error::Session("conversation not seeded".to_string()))?;

            match role {
                Role::User => context.push_user(text.clone())?,
                Role::Assistant => context.push_assistant(text.clone())?,
                Role::System => {
                    return Err(Error::Session("system turn is only set by seeding".to_string()));
                }
            }
        }

        let line = if role == Role::User {
            TranscriptLine::user(text)
        } else {
            TranscriptLine::bot(text)
        };

        tracing::info!(session_id = %self.id, "{line}");
        self.transcript.write().await.push(line.clone());
        let _ = self.events.send(SessionEvent::line(self.id, line));
        Ok(())
    }
}

/// Error from one step of the session, tagged with the step
#[derive(Debug)]
pub struct StageFailure {
    pub stage: TurnStage,
    pub error: Error,
}

trait AtStage<T> {
    fn at(self, stage: TurnStage) -> std::result::Result<T, StageFailure>;
}

impl<T, E: Into<Error>> AtStage<T> for std::result::Result<T, E> {
    fn at(self, stage: TurnStage) -> std::result::Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// One conversation from image analysis to stop or failure
pub struct ConversationSession {
    handle: Arc<SessionHandle>,
    gateway: Arc<dyn ModelGateway>,
    audio: Arc<dyn AudioIo>,
    scratch: ScratchSpace,
    image: UploadedImage,
    image_path: PathBuf,
    settings: SessionSettings,
}

impl ConversationSession {
    /// Prepare a session: allocate its scratch directory and persist the image
    ///
    /// # Errors
    ///
    /// Returns error if the scratch directory or image file cannot be written
    pub fn new(
        image: UploadedImage,
        gateway: Arc<dyn ModelGateway>,
        audio: Arc<dyn AudioIo>,
        settings: SessionSettings,
        scratch: &SessionConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let scratch = ScratchSpace::create(&scratch.scratch_dir, id, scratch.retain_artifacts)?;
        let image_path = scratch.store_image(&image)?;

        tracing::info!(
            session_id = %id,
            image = %image_path.display(),
            bytes = image.bytes().len(),
            "session created"
        );

        Ok(Self {
            handle: Arc::new(SessionHandle::new(id, events)),
            gateway,
            audio,
            scratch,
            image,
            image_path,
            settings,
        })
    }

    /// Shared handle for observing and stopping the session
    #[must_use]
    pub fn handle(&self) -> Arc<SessionHandle> {
        Arc::clone(&self.handle)
    }

    /// Path of the persisted upload
    #[must_use]
    pub fn image_path(&self) -> &std::path::Path {
        &self.image_path
    }

    /// Run the session to its terminal state
    pub async fn run(self) -> SessionState {
        let terminal = match self.drive().await {
            Ok(()) => SessionState::Stopped,
            Err(StageFailure { stage, error }) => {
                tracing::error!(
                    session_id = %self.handle.id,
                    %stage,
                    error = %error,
                    "session failed"
                );
                SessionState::Failed {
                    stage,
                    message: error.to_string(),
                }
            }
        };

        self.handle.transition(terminal.clone()).await;
        terminal
    }

    async fn drive(&self) -> std::result::Result<(), StageFailure> {
        self.handle.transition(SessionState::Analyzing).await;

        let analysis = self
            .gateway
            .analyze_image(
                &self.image.data_uri(),
                &self.settings.analysis_prompt,
                self.settings.analysis_max_tokens,
            )
            .await
            .at(TurnStage::Analyze)?;

        tracing::info!(session_id = %self.handle.id, analysis = %analysis, "image analyzed");
        self.handle.seed(analysis, &self.settings).await;

        if self.handle.is_stop_requested() {
            return Ok(());
        }
        self.handle.transition(SessionState::Running).await;

        while !self.handle.is_stop_requested() {
            self.run_turn().await?;
        }

        Ok(())
    }

    async fn run_turn(&self) -> std::result::Result<(), StageFailure> {
        let id = self.handle.id;

        let recording = self.scratch.recording_path();
        tracing::info!(session_id = %id, "recording audio");
        let path = recording.clone();
        self.blocking_audio(move |audio| audio.record(&path))
            .await
            .at(TurnStage::Record)?;
        tracing::info!(session_id = %id, "audio recording complete");

        let audio = tokio::fs::read(&recording).await.at(TurnStage::Record)?;
        let user_text = self
            .gateway
            .transcribe(&audio)
            .await
            .at(TurnStage::Transcribe)?;
        tracing::debug!(session_id = %id, bytes = user_text.len(), "transcription complete");
        self.handle
            .append(Role::User, user_text)
            .await
            .at(TurnStage::Transcribe)?;

        let turns = self.handle.turns().await.at(TurnStage::Complete)?;
        let reply = self
            .gateway
            .complete(&turns)
            .await
            .at(TurnStage::Complete)?;
        tracing::debug!(session_id = %id, bytes = reply.len(), "assistant reply");
        self.handle
            .append(Role::Assistant, reply.clone())
            .await
            .at(TurnStage::Complete)?;

        let speech = self
            .gateway
            .synthesize_speech(&reply, &self.settings.voice)
            .await
            .at(TurnStage::Synthesize)?;
        let speech_path = self.scratch.speech_path();
        tokio::fs::write(&speech_path, &speech)
            .await
            .at(TurnStage::Synthesize)?;

        self.blocking_audio(move |audio| audio.play(&speech_path))
            .await
            .at(TurnStage::Play)?;
        tracing::debug!(session_id = %id, "playback complete");

        Ok(())
    }

    async fn blocking_audio<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&dyn AudioIo) -> Result<()> + Send + 'static,
    {
        let audio = Arc::clone(&self.audio);
        tokio::task::spawn_blocking(move || op(audio.as_ref()))
            .await
            .map_err(|e| Error::Audio(format!("audio task failed: {e}")))?
    }
}
