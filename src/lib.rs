//! Tutor - voice and image tutoring assistant
//!
//! A user uploads a picture of a problem; the image is described once by a
//! hosted multimodal model, and a spoken conversation follows: the user's
//! speech is recorded and transcribed, a chat model replies as a tutor, and
//! the reply is synthesized and played back, turn after turn until stopped.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Browser UI (api)                     │
//! │   Upload  │  Start / Stop  │  Transcript (WebSocket) │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │          SessionController → ConversationSession     │
//! │   Analyze  │  Record → Transcribe → Chat → Speak     │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │                             │
//! ┌──────────▼──────────┐      ┌───────────▼────────────┐
//! │  Voice (cpal I/O)   │      │  Model gateway (OpenAI) │
//! └─────────────────────┘      └────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod session;
pub mod voice;

pub use config::Config;
pub use controller::{Affordances, SessionController, SessionSnapshot};
pub use error::{Error, Result};
pub use gateway::{ModelGateway, OpenAiGateway};
pub use session::{
    ConversationContext, ConversationSession, SessionEvent, SessionHandle, SessionState,
    TranscriptLine, Turn, TurnStage,
};
pub use voice::{AudioIo, DeviceAudio};
