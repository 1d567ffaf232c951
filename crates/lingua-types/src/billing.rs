//! Subscription tiers and credit-ledger constants.

use serde::{Deserialize, Serialize};

/// Default credit cost of one voice turn.
///
/// Flat per-turn pricing; deployments can override it via server config
/// without touching the ledger.
pub const DEFAULT_CREDIT_COST_PER_TURN: i64 = 1;

/// A user's subscription level, which determines the monthly credit allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Pro,
}

impl SubscriptionTier {
    /// Credits granted per month for this tier.
    pub fn monthly_allowance(self) -> i64 {
        match self {
            Self::Free => 20,
            Self::Basic => 400,
            Self::Pro => 1200,
        }
    }

    /// Returns the canonical string label for this tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
        }
    }

    /// Parses a tier label, falling back to [`SubscriptionTier::Free`] for
    /// anything unrecognized. Credits initialization must never fail on a
    /// bad tier string coming from an upstream billing webhook.
    pub fn from_label_or_free(label: &str) -> Self {
        match label {
            "basic" => Self::Basic,
            "pro" => Self::Pro,
            _ => Self::Free,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of a credit-ledger transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Usage charge; amount is negative.
    Debit,
    /// Grant or top-up; amount is positive.
    Credit,
    /// Monthly reset to the allowance; amount is the delta, possibly negative.
    Refresh,
}

impl TransactionType {
    /// Returns the canonical string label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Refresh => "refresh",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = ParseTransactionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "refresh" => Ok(Self::Refresh),
            _ => Err(ParseTransactionTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown transaction type string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown transaction type: {0}")]
pub struct ParseTransactionTypeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_allowances() {
        assert_eq!(SubscriptionTier::Free.monthly_allowance(), 20);
        assert_eq!(SubscriptionTier::Basic.monthly_allowance(), 400);
        assert_eq!(SubscriptionTier::Pro.monthly_allowance(), 1200);
    }

    #[test]
    fn unknown_tier_falls_back_to_free() {
        assert_eq!(
            SubscriptionTier::from_label_or_free("enterprise"),
            SubscriptionTier::Free
        );
        assert_eq!(
            SubscriptionTier::from_label_or_free("pro"),
            SubscriptionTier::Pro
        );
    }

    #[test]
    fn transaction_type_round_trip() {
        for tx_type in [
            TransactionType::Debit,
            TransactionType::Credit,
            TransactionType::Refresh,
        ] {
            let parsed: TransactionType = tx_type.as_str().parse().expect("should parse");
            assert_eq!(parsed, tx_type);
        }
    }
}
