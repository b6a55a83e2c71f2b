//! Vision API client for image analysis

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::chat::ChatCompletionResponse;
use crate::{Error, Result};

#[derive(Serialize)]
struct VisionRequest<'a> {
    model: &'a str,
    messages: [VisionMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct VisionMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

/// Describes images through the `/chat/completions` endpoint
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl VisionClient {
    /// Create a new vision client
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

    /// Describe an image
    ///
    /// # Arguments
    ///
    /// * `image_data_uri` - Full image as a `data:` URI
    /// * `prompt` - Question asked about the image
    /// * `max_tokens` - Response length budget
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or returns no choices. Empty text
    /// is passed through.
    pub async fn describe(
        &self,
        image_data_uri: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = VisionRequest {
            model: &self.model,
            messages: [VisionMessage {
                role: "user",
                content: [
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_uri,
                        },
                    },
                ],
            }],
            max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            uri_bytes = image_data_uri.len(),
            max_tokens,
            "requesting image analysis"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("vision API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("parse error: {e}")))?;

        let description = result
            .into_text()
            .ok_or_else(|| Error::Vision("empty response from vision API".to_string()))?;

        tracing::debug!(description = %description, "image described");
        Ok(description)
    }
}
