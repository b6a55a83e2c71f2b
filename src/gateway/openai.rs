//! OpenAI-backed model gateway

use async_trait::async_trait;

use super::{ChatClient, ModelGateway, SpeechToText, TextToSpeech, VisionClient};
use crate::Result;
use crate::config::Config;
use crate::session::Turn;

/// Model gateway over the OpenAI REST API
///
/// All four clients share one connection pool.
pub struct OpenAiGateway {
    vision: VisionClient,
    chat: ChatClient,
    stt: SpeechToText,
    tts: TextToSpeech,
}

impl OpenAiGateway {
    /// Build the gateway from configuration
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::new();
        let base_url = config.base_url.as_str();
        let key = &config.api_key;

        Self {
            vision: VisionClient::new(client.clone(), base_url, key.clone(), &config.models.vision),
            chat: ChatClient::new(client.clone(), base_url, key.clone(), &config.models.chat),
            stt: SpeechToText::new(client.clone(), base_url, key.clone(), &config.models.stt),
            tts: TextToSpeech::new(client, base_url, key.clone(), &config.models.tts),
        }
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn analyze_image(
        &self,
        image_data_uri: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        self.vision.describe(image_data_uri, prompt, max_tokens).await
    }

    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        self.stt.transcribe(audio).await
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.chat.complete(turns).await
    }

    async fn synthesize_speech(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        self.tts.synthesize(text, voice).await
    }
}
