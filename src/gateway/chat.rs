//! Chat completion client

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::session::Turn;
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
}

/// Chat completion response shared with the vision client
#[derive(Deserialize)]
pub(super) struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(super) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub(super) struct ResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any
    pub fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

/// Produces assistant replies through the `/chat/completions` endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ChatClient {
    /// Create a new chat client
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

    /// Complete the conversation with the next assistant message
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response carries no text
    pub async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: turns,
        };

        tracing::debug!(turns = turns.len(), model = %self.model, "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Chat(format!("chat API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await?;

        result
            .into_text()
            .ok_or_else(|| Error::Chat("empty response from chat API".to_string()))
    }
}
