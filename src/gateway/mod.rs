//! Model gateway
//!
//! Facade over the hosted image understanding, transcription, chat
//! completion and speech synthesis capabilities. Each call is a single
//! request/response with no retry; provider failures are returned to the
//! caller as-is.

mod chat;
mod openai;
mod stt;
mod tts;
mod vision;

use async_trait::async_trait;
use base64::Engine;

pub use chat::ChatClient;
pub use openai::OpenAiGateway;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
pub use vision::VisionClient;

use crate::Result;
use crate::session::Turn;

/// Hosted model capabilities used by the conversation loop
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Describe an image given as a `data:` URI
    async fn analyze_image(&self, image_data_uri: &str, prompt: &str, max_tokens: u32)
    -> Result<String>;

    /// Transcribe WAV audio to text
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Produce the next assistant message for the given history
    async fn complete(&self, turns: &[Turn]) -> Result<String>;

    /// Synthesize speech, returning MP3 bytes
    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}

/// Encode image bytes as a `data:image/<subtype>;base64,...` URI
#[must_use]
pub fn image_data_uri(subtype: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:image/{subtype};base64,{payload}")
}
