//! Wire types shared with the external speech and scoring services.

use crate::analysis::PronunciationAnalysis;
use serde::{Deserialize, Serialize};

/// Result of a speech-to-text call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// The transcribed text.
    pub text: String,
    /// Detected language code (e.g. "en-us").
    pub language: String,
    /// Duration of the recognized audio in seconds.
    pub duration_seconds: f64,
}

/// Result of a text-to-speech call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSpeech {
    /// Encoded audio (MP3).
    pub audio: Vec<u8>,
    /// Duration of the synthesized audio in seconds.
    pub duration_seconds: f64,
}

/// Application-level error reported by the scoring service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorerError {
    /// Machine-readable code (e.g. `AUDIO_TOO_SHORT`).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
    /// Whether the service considers the failure transient.
    #[serde(default)]
    pub retryable: bool,
}

/// Full response envelope from the pronunciation-scoring service.
///
/// `status` is `"success"` or `"error"`; exactly one of `analysis` / `error`
/// is expected to be present, but neither is guaranteed — a success status
/// with no analysis payload is treated as a failure by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PronunciationAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScorerError>,
}

impl ScorerResponse {
    /// True when the service reported success.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_decodes() {
        let json = r#"{
            "status": "error",
            "error": {"code": "AUDIO_TOO_SHORT", "message": "clip too short", "retryable": false}
        }"#;
        let resp: ScorerResponse = serde_json::from_str(json).expect("should deserialize");
        assert!(!resp.is_success());
        assert!(resp.analysis.is_none());
        let err = resp.error.expect("error payload");
        assert_eq!(err.code, "AUDIO_TOO_SHORT");
        assert_eq!(err.message, "clip too short");
    }

    #[test]
    fn success_response_decodes_with_details() {
        let json = r#"{
            "status": "success",
            "analysis": {
                "phoneme_count": 2,
                "match_count": 1,
                "substitution_count": 1,
                "deletion_count": 0,
                "insertion_count": 0,
                "phoneme_details": [
                    {"expected": "h", "actual": "h", "type": "match", "position": 0},
                    {"expected": "θ", "actual": "t", "type": "substitute", "position": 1}
                ],
                "processing_time_ms": 840
            }
        }"#;
        let resp: ScorerResponse = serde_json::from_str(json).expect("should deserialize");
        assert!(resp.is_success());
        let analysis = resp.analysis.expect("analysis payload");
        assert_eq!(analysis.phoneme_details.len(), 2);
        assert_eq!(analysis.match_count, 1);
    }
}
