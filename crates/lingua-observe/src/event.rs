//! Event domain, payload, and record types for the usage event log.

use serde::{Deserialize, Serialize};

/// Usage event domains.
///
/// Each domain groups related event types for filtering and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageDomain {
    /// Credit charges and the failures that need reconciling.
    #[serde(rename = "BILLING")]
    Billing,
    /// Pronunciation scoring outcomes.
    #[serde(rename = "SCORING")]
    Scoring,
}

impl UsageDomain {
    /// Returns the canonical string label for this domain.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "BILLING",
            Self::Scoring => "SCORING",
        }
    }
}

impl std::fmt::Display for UsageDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UsageDomain {
    type Err = ParseUsageDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BILLING" => Ok(Self::Billing),
            "SCORING" => Ok(Self::Scoring),
            _ => Err(ParseUsageDomainError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown usage domain string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown usage domain: {0}")]
pub struct ParseUsageDomainError(pub String);

/// Structured event payloads for each event type.
///
/// Payloads are serialised to JSON and stored in the `payload_json` column
/// of the `usage_events` table. Each variant corresponds to an `event_type`
/// string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageEventPayload {
    // ── Billing domain ───────────────────────────────────────────────
    /// A completed voice turn was charged successfully.
    TurnBilled {
        /// The thread the turn belongs to.
        thread_id: String,
        /// Credits deducted.
        cost: i64,
        /// The user's balance after the charge.
        balance_after: i64,
    },

    /// A charge for a completed turn failed. The turn itself stands; this
    /// row is the reconciliation record a billing sweep picks up.
    DebitFailed {
        /// The thread the turn belongs to.
        thread_id: String,
        /// Credits that should have been deducted.
        cost: i64,
        /// Why the debit failed, e.g. `insufficient credits`.
        reason: String,
    },

    // ── Scoring domain ───────────────────────────────────────────────
    /// A pronunciation analysis finished and was persisted.
    ScoringCompleted {
        /// Phonemes the scorer evaluated.
        phoneme_count: i64,
        /// How many matched the expected pronunciation.
        match_count: i64,
    },

    /// A pronunciation analysis failed terminally.
    ScoringFailed {
        /// Machine-readable failure code, e.g. `ML_SERVICE_ERROR`.
        error_code: String,
        /// Human-readable detail.
        detail: String,
    },
}

impl UsageEventPayload {
    /// Returns the canonical event type string for this payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnBilled { .. } => "TURN_BILLED",
            Self::DebitFailed { .. } => "DEBIT_FAILED",
            Self::ScoringCompleted { .. } => "SCORING_COMPLETED",
            Self::ScoringFailed { .. } => "SCORING_FAILED",
        }
    }

    /// Returns the domain for this payload.
    pub fn domain(&self) -> UsageDomain {
        match self {
            Self::TurnBilled { .. } | Self::DebitFailed { .. } => UsageDomain::Billing,
            Self::ScoringCompleted { .. } | Self::ScoringFailed { .. } => UsageDomain::Scoring,
        }
    }
}

/// A single row from the `usage_events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Auto-incremented row ID.
    pub id: i64,
    /// The user the event concerns.
    pub user_id: String,
    /// The event domain (`BILLING` or `SCORING`).
    pub domain: String,
    /// The specific event type (e.g. `DEBIT_FAILED`).
    pub event_type: String,
    /// The identifier of the entity involved, usually a message ID.
    pub entity_id: String,
    /// Monotonically increasing sequence number within the user's stream.
    pub seq: i64,
    /// The structured event payload as a JSON string.
    pub payload_json: String,
    /// ISO 8601 timestamp of when the event occurred.
    pub occurred_at: String,
}
