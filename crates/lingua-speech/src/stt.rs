//! HTTP client for the speech-to-text service.

use std::time::Duration;

use async_trait::async_trait;
use lingua_types::Transcription;
use serde::Serialize;

use crate::error::SpeechError;
use crate::traits::SpeechToText;

/// Time allowed for one transcription call, covering the service's own
/// download of the signed audio URL.
const STT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    audio_url: &'a str,
}

/// Client for `POST {base}/v1/transcribe`.
#[derive(Debug, Clone)]
pub struct HttpSpeechToText {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeechToText {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder().timeout(STT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription, SpeechError> {
        let url = format!("{}/v1/transcribe", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&TranscribeRequest { audio_url })
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

        let transcription: Transcription = resp
            .json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        tracing::debug!(
            language = %transcription.language,
            duration_seconds = transcription.duration_seconds,
            "transcription received"
        );
        Ok(transcription)
    }
}
