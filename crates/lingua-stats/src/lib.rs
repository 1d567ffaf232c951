//! Lifetime phoneme statistics per user.
//!
//! Each completed pronunciation analysis is folded into per-(user, phoneme)
//! counters and per-(user, expected, actual) substitution counters. All
//! writes are additive upserts inside one transaction, so re-applying a batch
//! doubles the counts — callers must dispatch each analysis exactly once
//! (the message claim in `lingua-threads` enforces that).

use std::collections::HashMap;

use lingua_types::{PhonemeDetail, PhonemeOutcome};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How many substitution patterns `user_stats` returns.
const TOP_SUBSTITUTIONS_LIMIT: u32 = 10;

/// Errors that can occur during statistics operations.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Lifetime counters for a single phoneme.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhonemeStat {
    pub phoneme: String,
    pub total_attempts: i64,
    pub correct_count: i64,
    pub deletion_count: i64,
    /// Percentage, `correct_count / total_attempts * 100`.
    pub accuracy: f64,
}

/// One recurring confusion: the user says `actual` where `expected` belongs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstitutionPattern {
    pub expected_phoneme: String,
    pub actual_phoneme: String,
    pub occurrence_count: i64,
}

/// A user's aggregated pronunciation picture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub total_attempts: i64,
    pub total_correct: i64,
    /// Overall percentage; 0.0 when the user has no attempts yet.
    pub overall_accuracy: f64,
    /// Per-phoneme counters, weakest accuracy first.
    pub phonemes: Vec<PhonemeStat>,
    /// Most frequent substitution patterns, at most ten, most frequent first.
    pub top_substitutions: Vec<SubstitutionPattern>,
}

#[derive(Default)]
struct PhonemeTally {
    attempts: i64,
    correct: i64,
    deletions: i64,
}

/// Folds one analysis's phoneme details into a user's lifetime counters.
///
/// Insertions are skipped (there is no expected phoneme to attribute them
/// to), as are details with an empty expected phoneme. Everything else
/// counts as an attempt; matches increment the correct counter, deletions
/// the deletion counter, and substitutions with a non-empty actual phoneme
/// additionally feed the substitution table. The whole batch commits in one
/// transaction.
pub fn record_results(
    conn: &Connection,
    user_id: &str,
    details: &[PhonemeDetail],
) -> Result<(), StatsError> {
    let mut tallies: HashMap<&str, PhonemeTally> = HashMap::new();
    let mut substitutions: HashMap<(&str, &str), i64> = HashMap::new();

    for detail in details {
        if detail.outcome == PhonemeOutcome::Insert || detail.expected.is_empty() {
            continue;
        }
        let tally = tallies.entry(detail.expected.as_str()).or_default();
        tally.attempts += 1;
        match detail.outcome {
            PhonemeOutcome::Match => tally.correct += 1,
            PhonemeOutcome::Delete => tally.deletions += 1,
            PhonemeOutcome::Substitute => {
                if !detail.actual.is_empty() {
                    *substitutions
                        .entry((detail.expected.as_str(), detail.actual.as_str()))
                        .or_insert(0) += 1;
                }
            }
            PhonemeOutcome::Insert => unreachable!("insertions are filtered above"),
        }
    }

    if tallies.is_empty() && substitutions.is_empty() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for (phoneme, tally) in &tallies {
        tx.execute(
            "INSERT INTO phoneme_stats (user_id, phoneme, total_attempts, correct_count, deletion_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, phoneme) DO UPDATE SET
                 total_attempts = total_attempts + excluded.total_attempts,
                 correct_count = correct_count + excluded.correct_count,
                 deletion_count = deletion_count + excluded.deletion_count,
                 updated_at = datetime('now')",
            params![user_id, phoneme, tally.attempts, tally.correct, tally.deletions],
        )?;
    }
    for ((expected, actual), count) in &substitutions {
        tx.execute(
            "INSERT INTO phoneme_substitutions (user_id, expected_phoneme, actual_phoneme, occurrence_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, expected_phoneme, actual_phoneme) DO UPDATE SET
                 occurrence_count = occurrence_count + excluded.occurrence_count,
                 updated_at = datetime('now')",
            params![user_id, expected, actual, count],
        )?;
    }
    tx.commit()?;

    tracing::debug!(
        user_id,
        phonemes = tallies.len(),
        substitutions = substitutions.len(),
        "recorded phoneme results"
    );
    Ok(())
}

/// Builds the aggregated statistics view for a user.
///
/// Phonemes come back ordered by accuracy ascending so the ones most in need
/// of practice lead; substitutions are the top ten by occurrence. A user with
/// no recorded attempts gets empty lists and 0.0 accuracy.
pub fn user_stats(conn: &Connection, user_id: &str) -> Result<UserStats, StatsError> {
    let (total_attempts, total_correct): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(total_attempts), 0), COALESCE(SUM(correct_count), 0)
         FROM phoneme_stats WHERE user_id = ?1",
        [user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let overall_accuracy = if total_attempts > 0 {
        total_correct as f64 / total_attempts as f64 * 100.0
    } else {
        0.0
    };

    let mut stmt = conn.prepare(
        "SELECT phoneme, total_attempts, correct_count, deletion_count
         FROM phoneme_stats WHERE user_id = ?1
         ORDER BY CAST(correct_count AS REAL) / total_attempts ASC, phoneme ASC",
    )?;
    let rows = stmt.query_map([user_id], map_row_to_stat)?;
    let mut phonemes = Vec::new();
    for row in rows {
        phonemes.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT expected_phoneme, actual_phoneme, occurrence_count
         FROM phoneme_substitutions WHERE user_id = ?1
         ORDER BY occurrence_count DESC, expected_phoneme ASC, actual_phoneme ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, TOP_SUBSTITUTIONS_LIMIT], |row| {
        Ok(SubstitutionPattern {
            expected_phoneme: row.get(0)?,
            actual_phoneme: row.get(1)?,
            occurrence_count: row.get(2)?,
        })
    })?;
    let mut top_substitutions = Vec::new();
    for row in rows {
        top_substitutions.push(row?);
    }

    Ok(UserStats {
        total_attempts,
        total_correct,
        overall_accuracy,
        phonemes,
        top_substitutions,
    })
}

fn map_row_to_stat(row: &Row) -> rusqlite::Result<PhonemeStat> {
    let total_attempts: i64 = row.get(1)?;
    let correct_count: i64 = row.get(2)?;
    let accuracy = if total_attempts > 0 {
        correct_count as f64 / total_attempts as f64 * 100.0
    } else {
        0.0
    };
    Ok(PhonemeStat {
        phoneme: row.get(0)?,
        total_attempts,
        correct_count,
        deletion_count: row.get(3)?,
        accuracy,
    })
}
