//! Text-to-speech (TTS) processing

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Synthesizes speech from text through the `/audio/speech` endpoint
pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl TextToSpeech {
    /// Create a new TTS client
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    /// Synthesize text to speech
    ///
    /// # Arguments
    ///
    /// * `text` - Text to synthesize
    /// * `voice` - Voice identifier (e.g. "nova")
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
        };

        tracing::debug!(chars = text.len(), voice, "starting speech synthesis");

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
