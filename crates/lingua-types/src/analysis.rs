//! Pronunciation-analysis status machine and payload schema.
//!
//! The analysis payload is stored on the message row as JSON. Unlike the
//! loosely-typed blob it replaces, the schema here is explicit and versioned:
//! `schema_version` is written with every payload so historical rows remain
//! decodable as the shape evolves.

use serde::{Deserialize, Serialize};

/// Current version of the persisted [`PronunciationAnalysis`] schema.
pub const ANALYSIS_SCHEMA_VERSION: u32 = 1;

/// Lifecycle of a message's pronunciation sub-record.
///
/// `None` for text-only and assistant messages. User messages carrying audio
/// start at `Pending` and move exactly once to `Complete` or `Failed`; the
/// transition is terminal and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PronunciationStatus {
    /// No scoring applies to this message.
    None,
    /// Scoring has been dispatched but not finished.
    Pending,
    /// Scoring succeeded; the analysis payload is present.
    Complete,
    /// Scoring failed; the error field carries `"<CODE>: <detail>"`.
    Failed,
}

impl PronunciationStatus {
    /// Returns the canonical string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PronunciationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PronunciationStatus {
    type Err = ParsePronunciationStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "pending" => Ok(Self::Pending),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            _ => Err(ParsePronunciationStatusError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown pronunciation status string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown pronunciation status: {0}")]
pub struct ParsePronunciationStatusError(pub String);

/// How a single expected phoneme compared against the recorded audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhonemeOutcome {
    /// The expected phoneme was produced.
    Match,
    /// A different phoneme was produced in its place.
    Substitute,
    /// The expected phoneme was omitted.
    Delete,
    /// An extra phoneme with no expected counterpart was produced.
    Insert,
}

/// One aligned phoneme comparison from the scoring service.
///
/// For `insert` entries the expected symbol is empty; for `delete` entries the
/// actual symbol is empty. Field names match the scoring service's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonemeDetail {
    /// The expected IPA symbol (empty for insertions).
    pub expected: String,
    /// The IPA symbol actually produced (empty for deletions).
    pub actual: String,
    /// Classification of the comparison.
    #[serde(rename = "type")]
    pub outcome: PhonemeOutcome,
    /// Zero-based position in the expected phoneme sequence.
    pub position: usize,
}

/// The full scoring result persisted on a message once analysis completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationAnalysis {
    /// Schema version of this payload; see [`ANALYSIS_SCHEMA_VERSION`].
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Total expected phonemes scored.
    pub phoneme_count: u32,
    /// Phonemes produced correctly.
    pub match_count: u32,
    /// Phonemes replaced by a different symbol.
    pub substitution_count: u32,
    /// Phonemes omitted entirely.
    pub deletion_count: u32,
    /// Extra phonemes with no expected counterpart.
    pub insertion_count: u32,
    /// Per-phoneme alignment detail.
    pub phoneme_details: Vec<PhonemeDetail>,
    /// Wall-clock time the scoring service spent, in milliseconds.
    pub processing_time_ms: u64,
}

fn default_schema_version() -> u32 {
    ANALYSIS_SCHEMA_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            PronunciationStatus::None,
            PronunciationStatus::Pending,
            PronunciationStatus::Complete,
            PronunciationStatus::Failed,
        ] {
            let parsed: PronunciationStatus = status.as_str().parse().expect("should parse");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn detail_uses_wire_field_names() {
        let detail = PhonemeDetail {
            expected: "θ".to_string(),
            actual: "t".to_string(),
            outcome: PhonemeOutcome::Substitute,
            position: 3,
        };
        let json = serde_json::to_value(&detail).expect("should serialize");
        assert_eq!(json["type"], "substitute");
        assert_eq!(json["expected"], "θ");
    }

    #[test]
    fn analysis_without_version_decodes_as_v1() {
        // Rows written before the version field existed default to version 1.
        let json = r#"{
            "phoneme_count": 2,
            "match_count": 2,
            "substitution_count": 0,
            "deletion_count": 0,
            "insertion_count": 0,
            "phoneme_details": [],
            "processing_time_ms": 120
        }"#;
        let analysis: PronunciationAnalysis =
            serde_json::from_str(json).expect("should deserialize");
        assert_eq!(analysis.schema_version, ANALYSIS_SCHEMA_VERSION);
    }
}
