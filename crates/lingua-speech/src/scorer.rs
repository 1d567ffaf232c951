//! HTTP client for the pronunciation-scoring service.

use std::time::Duration;

use async_trait::async_trait;
use lingua_types::ScorerResponse;
use serde::Serialize;

use crate::error::SpeechError;
use crate::traits::PronunciationScorer;

/// Scoring runs phoneme alignment on the service side and can take a while
/// for longer clips.
const SCORER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    audio_url: &'a str,
    expected_text: &'a str,
    language: &'a str,
}

/// Client for `POST {base}/api/v1/analyze-pronunciation`.
#[derive(Debug, Clone)]
pub struct HttpPronunciationScorer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPronunciationScorer {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(SCORER_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PronunciationScorer for HttpPronunciationScorer {
    async fn analyze(
        &self,
        audio_url: &str,
        expected_text: &str,
        language: &str,
    ) -> Result<ScorerResponse, SpeechError> {
        let url = format!("{}/api/v1/analyze-pronunciation", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&AnalyzeRequest {
                audio_url,
                expected_text,
                language,
            })
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

        // Application-level errors arrive as a 200 with status == "error";
        // they are the caller's to classify, not transport failures.
        resp.json()
            .await
            .map_err(|e| SpeechError::Decode(e.to_string()))
    }
}
