//! Shared types and constants for the lingua platform.
//!
//! This crate provides the foundational types used across all lingua crates:
//! message roles, the pronunciation-analysis state machine and payload schema,
//! subscription tiers, and the external-service wire types. No crate in the
//! workspace depends on anything *except* `lingua-types` for cross-cutting
//! type definitions, which keeps the dependency graph acyclic.

pub mod analysis;
pub mod billing;
pub mod speech;

pub use analysis::{
    PhonemeDetail, PhonemeOutcome, PronunciationAnalysis, PronunciationStatus,
    ANALYSIS_SCHEMA_VERSION,
};
pub use billing::{SubscriptionTier, TransactionType, DEFAULT_CREDIT_COST_PER_TURN};
pub use speech::{ScorerError, ScorerResponse, SynthesizedSpeech, Transcription};

use serde::{Deserialize, Serialize};

/// The role of a message within a conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A transcribed user utterance.
    User,
    /// A generated assistant reply.
    Assistant,
}

impl Role {
    /// Returns the canonical string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown message role: {0}")]
pub struct ParseRoleError(pub String);

/// A role/content pair handed to the reply-generation service.
///
/// The full thread history is mapped into a list of these before each
/// generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}
