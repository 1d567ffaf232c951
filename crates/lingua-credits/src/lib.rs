//! Credits ledger for the lingua platform.
//!
//! Every balance mutation writes the new balance and an audit transaction row
//! inside a single database transaction, so the transaction log can always be
//! replayed to reproduce the balance. Debits that would push the balance
//! negative are rejected before any row is written.

use lingua_types::{SubscriptionTier, TransactionType};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum CreditsError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("no credits account for user: {0}")]
    AccountNotFound(String),
    #[error("insufficient credits: balance {balance}, requested {requested}")]
    InsufficientCredits { balance: i64, requested: i64 },
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}

/// A user's credit balance row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCredits {
    pub user_id: String,
    pub balance: i64,
    pub monthly_allowance: i64,
    pub used_this_period: i64,
    pub last_refreshed_at: String,
    pub updated_at: String,
}

/// One entry in the append-only transaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditTransaction {
    pub id: i64,
    pub user_id: String,
    pub tx_type: TransactionType,
    /// Signed delta applied to the balance.
    pub amount: i64,
    /// Balance after this entry was applied.
    pub balance_after: i64,
    /// Optional link to the entity that caused the charge, e.g. a message ID.
    pub reference: Option<String>,
    pub description: String,
    pub created_at: String,
}

/// Creates the credits account for a user at the tier's monthly allowance.
///
/// Runs against whatever connection (or open transaction) the caller holds,
/// so account creation and the initial grant can commit atomically with the
/// user row itself. Unknown tier labels fall back to the free allowance
/// rather than failing signup.
pub fn initialize(
    conn: &Connection,
    user_id: &str,
    tier: SubscriptionTier,
) -> Result<UserCredits, CreditsError> {
    let allowance = tier.monthly_allowance();
    let credits = conn.query_row(
        "INSERT INTO credits (user_id, balance, monthly_allowance, used_this_period, last_refreshed_at)
         VALUES (?1, ?2, ?2, 0, datetime('now'))
         RETURNING user_id, balance, monthly_allowance, used_this_period,
                   last_refreshed_at, updated_at",
        params![user_id, allowance],
        map_row_to_credits,
    )?;
    conn.execute(
        "INSERT INTO credit_transactions (user_id, tx_type, amount, balance_after, reference, description)
         VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
        params![
            user_id,
            TransactionType::Credit.as_str(),
            allowance,
            allowance,
            format!("Initial {} tier allowance", tier),
        ],
    )?;
    Ok(credits)
}

/// Retrieves a user's credit balance.
pub fn get_credits(conn: &Connection, user_id: &str) -> Result<UserCredits, CreditsError> {
    conn.query_row(
        "SELECT user_id, balance, monthly_allowance, used_this_period,
                last_refreshed_at, updated_at
         FROM credits WHERE user_id = ?1",
        [user_id],
        map_row_to_credits,
    )
    .optional()?
    .ok_or_else(|| CreditsError::AccountNotFound(user_id.to_string()))
}

/// Deducts `amount` credits from a user's balance.
///
/// Balance read, guard, balance write, and transaction insert all happen in
/// one database transaction. If the balance is short the whole operation is
/// rejected and nothing is written.
pub fn deduct(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reference: Option<&str>,
    description: &str,
) -> Result<UserCredits, CreditsError> {
    if amount <= 0 {
        return Err(CreditsError::NonPositiveAmount(amount));
    }

    let tx = conn.unchecked_transaction()?;
    let balance = balance_for_update(&tx, user_id)?;
    if balance < amount {
        return Err(CreditsError::InsufficientCredits {
            balance,
            requested: amount,
        });
    }

    let new_balance = balance - amount;
    tx.execute(
        "UPDATE credits
         SET balance = ?2,
             used_this_period = used_this_period + ?3,
             updated_at = datetime('now')
         WHERE user_id = ?1",
        params![user_id, new_balance, amount],
    )?;
    insert_transaction(
        &tx,
        user_id,
        TransactionType::Debit,
        -amount,
        new_balance,
        reference,
        description,
    )?;
    tx.commit()?;

    get_credits(conn, user_id)
}

/// Adds `amount` credits to a user's balance (top-up or promotional grant).
pub fn add(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reference: Option<&str>,
    description: &str,
) -> Result<UserCredits, CreditsError> {
    if amount <= 0 {
        return Err(CreditsError::NonPositiveAmount(amount));
    }

    let tx = conn.unchecked_transaction()?;
    let balance = balance_for_update(&tx, user_id)?;
    let new_balance = balance + amount;
    tx.execute(
        "UPDATE credits SET balance = ?2, updated_at = datetime('now') WHERE user_id = ?1",
        params![user_id, new_balance],
    )?;
    insert_transaction(
        &tx,
        user_id,
        TransactionType::Credit,
        amount,
        new_balance,
        reference,
        description,
    )?;
    tx.commit()?;

    get_credits(conn, user_id)
}

/// Resets a user's balance to their monthly allowance.
///
/// The logged amount is the delta (`allowance - old_balance`), which may be
/// negative for a user who carried more than the allowance into the new
/// period. Also zeroes the period usage counter.
pub fn refresh_monthly(conn: &Connection, user_id: &str) -> Result<UserCredits, CreditsError> {
    let tx = conn.unchecked_transaction()?;
    let (balance, allowance): (i64, i64) = tx
        .query_row(
            "SELECT balance, monthly_allowance FROM credits WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| CreditsError::AccountNotFound(user_id.to_string()))?;

    let delta = allowance - balance;
    tx.execute(
        "UPDATE credits
         SET balance = monthly_allowance,
             used_this_period = 0,
             last_refreshed_at = datetime('now'),
             updated_at = datetime('now')
         WHERE user_id = ?1",
        [user_id],
    )?;
    insert_transaction(
        &tx,
        user_id,
        TransactionType::Refresh,
        delta,
        allowance,
        None,
        "Monthly credit refresh",
    )?;
    tx.commit()?;

    get_credits(conn, user_id)
}

/// Changes a user's monthly allowance (tier upgrade or downgrade).
///
/// The current balance is untouched; the new allowance applies at the next
/// refresh.
pub fn update_allowance(
    conn: &Connection,
    user_id: &str,
    tier: SubscriptionTier,
) -> Result<UserCredits, CreditsError> {
    let count = conn.execute(
        "UPDATE credits SET monthly_allowance = ?2, updated_at = datetime('now') WHERE user_id = ?1",
        params![user_id, tier.monthly_allowance()],
    )?;
    if count == 0 {
        return Err(CreditsError::AccountNotFound(user_id.to_string()));
    }
    get_credits(conn, user_id)
}

/// Lists a user's transaction history, newest first.
pub fn transaction_history(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<CreditTransaction>, CreditsError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, tx_type, amount, balance_after, reference, description, created_at
         FROM credit_transactions WHERE user_id = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], map_row_to_transaction)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

fn balance_for_update(conn: &Connection, user_id: &str) -> Result<i64, CreditsError> {
    conn.query_row(
        "SELECT balance FROM credits WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CreditsError::AccountNotFound(user_id.to_string()))
}

fn insert_transaction(
    conn: &Connection,
    user_id: &str,
    tx_type: TransactionType,
    amount: i64,
    balance_after: i64,
    reference: Option<&str>,
    description: &str,
) -> Result<(), CreditsError> {
    conn.execute(
        "INSERT INTO credit_transactions (user_id, tx_type, amount, balance_after, reference, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            tx_type.as_str(),
            amount,
            balance_after,
            reference,
            description
        ],
    )?;
    Ok(())
}

fn map_row_to_credits(row: &Row) -> rusqlite::Result<UserCredits> {
    Ok(UserCredits {
        user_id: row.get(0)?,
        balance: row.get(1)?,
        monthly_allowance: row.get(2)?,
        used_this_period: row.get(3)?,
        last_refreshed_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_row_to_transaction(row: &Row) -> rusqlite::Result<CreditTransaction> {
    let tx_type_str: String = row.get(2)?;
    let tx_type: TransactionType = tx_type_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(CreditTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        tx_type,
        amount: row.get(3)?,
        balance_after: row.get(4)?,
        reference: row.get(5)?,
        description: row.get(6)?,
        created_at: row.get(7)?,
    })
}
