//! HTTP client for the conversational reply service.

use std::time::Duration;

use async_trait::async_trait;
use lingua_types::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::traits::ReplyGenerator;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct GenerateResponse {
    content: String,
}

/// Client for `POST {base}/ml/generate`.
#[derive(Debug, Clone)]
pub struct HttpReplyGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpReplyGenerator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ReplyGenerator for HttpReplyGenerator {
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, SpeechError> {
        let url = format!("{}/ml/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest { messages: history })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(SpeechError::UnexpectedStatus {
                status: status.as_u16(),
                detail,
            });
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        Ok(body.content)
    }
}
