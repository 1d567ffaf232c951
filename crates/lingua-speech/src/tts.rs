//! HTTP client for the speech-synthesis service.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lingua_types::SynthesizedSpeech;
use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::traits::SpeechSynthesizer;

const TTS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    audio_base64: String,
    duration_seconds: f64,
}

/// Client for `POST {base}/v1/synthesize`.
#[derive(Debug, Clone)]
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder().timeout(TTS_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, SpeechError> {
        let url = format!("{}/v1/synthesize", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&SynthesizeRequest { text })
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

        let body: SynthesizeResponse = resp
            .json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))?;
        let audio = BASE64
            .decode(&body.audio_base64)
            .map_err(|e| SpeechError::Decode(format!("invalid audio_base64: {e}")))?;
        Ok(SynthesizedSpeech {
            audio,
            duration_seconds: body.duration_seconds,
        })
    }
}
