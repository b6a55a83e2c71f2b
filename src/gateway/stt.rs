//! Speech-to-text client

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// File name sent with each recording
const UPLOAD_NAME: &str = "recording.wav";

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes recordings through the `/audio/transcriptions` endpoint
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl SpeechToText {
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

    fn form(&self, audio: &[u8]) -> Result<Form> {
        let file = Part::bytes(audio.to_vec())
            .file_name(UPLOAD_NAME)
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(format!("invalid upload: {e}")))?;

        Ok(Form::new().part("file", file).text("model", self.model.clone()))
    }

    /// Transcribe a WAV recording
    ///
    /// An empty transcript is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `Error::Stt` if the request fails, the service answers with
    /// a non-success status, or the body cannot be parsed
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(model = %self.model, audio_bytes = audio.len(), "requesting transcription");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(self.form(audio)?)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("transcription API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("parse error: {e}")))?;

        Ok(result.text)
    }
}
