//! Session controller
//!
//! Maps the two UI actions onto session lifecycle transitions and owns the
//! uploaded image between sessions. At most one session is active at a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{Config, SessionConfig};
use crate::gateway::ModelGateway;
use crate::session::{
    ConversationSession, EVENT_CAPACITY, ImageKind, SessionEvent, SessionHandle, SessionSettings,
    SessionState, TranscriptLine, UploadedImage,
};
use crate::voice::AudioIo;
use crate::{Error, Result};

/// Which of the two actions the UI should offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Affordances {
    pub can_start: bool,
    pub can_stop: bool,
}

/// Everything the UI needs to render
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    #[serde(flatten)]
    pub state: SessionState,
    pub message: String,
    #[serde(flatten)]
    pub affordances: Affordances,
    pub has_image: bool,
    pub analysis: Option<String>,
    pub transcript: Vec<TranscriptLine>,
}

#[derive(Default)]
struct Inner {
    image: Option<UploadedImage>,
    session: Option<Arc<SessionHandle>>,
    task: Option<JoinHandle<SessionState>>,
}

/// Owner of the uploaded image and the current session
pub struct SessionController {
    gateway: Arc<dyn ModelGateway>,
    audio: Arc<dyn AudioIo>,
    settings: SessionSettings,
    scratch: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    inner: Mutex<Inner>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        audio: Arc<dyn AudioIo>,
        settings: SessionSettings,
        scratch: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            audio,
            settings,
            scratch,
            events,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Build a controller from loaded configuration
    #[must_use]
    pub fn from_config(
        config: &Config,
        gateway: Arc<dyn ModelGateway>,
        audio: Arc<dyn AudioIo>,
    ) -> Self {
        Self::new(
            gateway,
            audio,
            SessionSettings::from_config(config),
            config.session.clone(),
        )
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Store an uploaded image for the next session
    ///
    /// # Errors
    ///
    /// Returns error if the content type is not JPEG/PNG or the body is empty
    pub async fn upload_image(&self, content_type: &str, bytes: Vec<u8>) -> Result<()> {
        let kind = ImageKind::from_mime(content_type)?;
        let image = UploadedImage::new(kind, bytes)?;

        tracing::info!(kind = ?kind, bytes = image.bytes().len(), "image uploaded");
        self.inner.lock().await.image = Some(image);
        Ok(())
    }

    /// Actions currently offered to the user
    pub async fn affordances(&self) -> Affordances {
        let inner = self.inner.lock().await;
        Self::affordances_of(&inner).await
    }

    async fn affordances_of(inner: &Inner) -> Affordances {
        match &inner.session {
            Some(handle) if !handle.state().await.is_terminal() => Affordances {
                can_start: false,
                can_stop: !handle.is_stop_requested(),
            },
            _ => Affordances {
                can_start: inner.image.is_some(),
                can_stop: false,
            },
        }
    }

    /// Start a conversation with the uploaded image
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if no image is uploaded or a session is
    /// still active, or an I/O error if the scratch space cannot be prepared
    pub async fn start(&self) -> Result<Arc<SessionHandle>> {
        let mut inner = self.inner.lock().await;

        if !Self::affordances_of(&inner).await.can_start {
            let reason = if inner.image.is_none() {
                "upload an image before starting a conversation"
            } else {
                "a conversation is already in progress"
            };
            return Err(Error::Precondition(reason.to_string()));
        }

        let image = inner
            .image
            .clone()
            .ok_or_else(|| Error::Precondition("no image uploaded".to_string()))?;

        let session = ConversationSession::new(
            image,
            Arc::clone(&self.gateway),
            Arc::clone(&self.audio),
            self.settings.clone(),
            &self.scratch,
            self.events.clone(),
        )?;
        let handle = session.handle();

        tracing::info!(session_id = %handle.id(), "starting conversation");
        inner.task = Some(tokio::spawn(session.run()));
        inner.session = Some(Arc::clone(&handle));

        Ok(handle)
    }

    /// Ask the active conversation to stop after its current turn
    ///
    /// # Errors
    ///
    /// Returns `Error::Precondition` if no conversation can be stopped
    pub async fn stop(&self) -> Result<Arc<SessionHandle>> {
        let inner = self.inner.lock().await;

        if !Self::affordances_of(&inner).await.can_stop {
            return Err(Error::Precondition(
                "no running conversation to stop".to_string(),
            ));
        }

        let handle = inner
            .session
            .clone()
            .ok_or_else(|| Error::Precondition("no conversation".to_string()))?;
        handle.stop();
        Ok(handle)
    }

    /// Wait for the current session task to finish
    ///
    /// Returns `None` if no session was started or it was already joined.
    pub async fn join(&self) -> Option<SessionState> {
        let task = self.inner.lock().await.task.take()?;
        match task.await {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::error!(error = %e, "session task panicked");
                None
            }
        }
    }

    /// Current state for rendering
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        let affordances = Self::affordances_of(&inner).await;
        let has_image = inner.image.is_some();

        match &inner.session {
            Some(handle) => {
                let state = handle.state().await;
                let message = if handle.is_stop_requested() && !state.is_terminal() {
                    "Stopping after the current turn...".to_string()
                } else {
                    state.status_message()
                };

                SessionSnapshot {
                    session_id: Some(handle.id()),
                    message,
                    state,
                    affordances,
                    has_image,
                    analysis: handle.analysis().await,
                    transcript: handle.transcript().await,
                }
            }
            None => {
                let message = if has_image {
                    "Image uploaded. Press 'Initialize Conversation' to begin.".to_string()
                } else {
                    SessionState::Idle.status_message()
                };

                SessionSnapshot {
                    session_id: None,
                    state: SessionState::Idle,
                    message,
                    affordances,
                    has_image,
                    analysis: None,
                    transcript: Vec::new(),
                }
            }
        }
    }
}
