//! Service seams for the conversation pipeline.
//!
//! The orchestrator and the scoring worker only ever see these traits, so
//! the server can be wired with real HTTP clients in production and with
//! scripted implementations in tests.

use std::time::Duration;

use async_trait::async_trait;
use lingua_types::{ChatMessage, ScorerResponse, SynthesizedSpeech, Transcription};

use crate::error::SpeechError;

/// Who a signed URL is minted for.
///
/// External URLs are handed to browsers and carry the public base address;
/// internal URLs go to backend services (the transcriber, the scorer) that
/// reach the server over the private network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    External,
    Internal,
}

/// Durable audio storage with signed, expiring access URLs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `data` under `key`, overwriting any previous object.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), SpeechError>;

    /// Retrieves the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, SpeechError>;

    /// Mints a signed URL for `key` that stops working after `ttl`.
    fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
        audience: Audience,
    ) -> Result<String, SpeechError>;
}

/// Speech-to-text over a signed audio URL.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<Transcription, SpeechError>;
}

/// Conversational reply generation from chat history.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, history: &[ChatMessage]) -> Result<String, SpeechError>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, SpeechError>;
}

/// Phoneme-level pronunciation scoring.
///
/// Returns the service's full response envelope; application-level failures
/// (`status == "error"`) come back as `Ok` with the error payload set, since
/// the worker maps them to failure codes rather than retrying.
#[async_trait]
pub trait PronunciationScorer: Send + Sync {
    async fn analyze(
        &self,
        audio_url: &str,
        expected_text: &str,
        language: &str,
    ) -> Result<ScorerResponse, SpeechError>;
}
