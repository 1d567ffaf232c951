//! Thread and message persistence for the lingua platform.
//!
//! Threads are conversation containers owned by a user; messages are the
//! utterances inside them, in insertion (= chronological) order. User messages
//! that carry audio also carry the pronunciation sub-record, whose status
//! moves `pending → complete | failed` exactly once. All transitions are
//! guarded UPDATE statements, so a terminal status can never regress and two
//! workers can never both win the claim for the same message.

use lingua_types::{PronunciationAnalysis, PronunciationStatus, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during thread or message operations.
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
    #[error("message not found: {0}")]
    MessageNotFound(String),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    /// Unique public ID (UUID).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Archive timestamp (ISO 8601); None while active.
    pub archived_at: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// One utterance in a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique public ID (UUID).
    pub id: String,
    /// The containing thread.
    pub thread_id: String,
    /// Who produced the utterance.
    pub role: Role,
    /// Transcript (user) or reply text (assistant).
    pub content: String,
    /// Object-store key of the audio, if any.
    pub audio_key: Option<String>,
    /// Audio duration in seconds, if known.
    pub audio_duration_seconds: Option<f64>,
    /// Whether playable audio exists for this message.
    pub has_audio: bool,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Pronunciation scoring state.
    pub pronunciation_status: PronunciationStatus,
    /// Scoring payload, present once status is `complete`.
    pub pronunciation_analysis: Option<PronunciationAnalysis>,
    /// `"<CODE>: <detail>"`, present once status is `failed`.
    pub pronunciation_error: Option<String>,
}

/// Parameters for creating a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    pub audio_key: Option<String>,
    pub audio_duration_seconds: Option<f64>,
    pub has_audio: bool,
    pub pronunciation_status: PronunciationStatus,
}

/// Creates a new thread for the given user.
pub fn create_thread(
    conn: &Connection,
    id: &str,
    user_id: &str,
    name: Option<&str>,
) -> Result<Thread, ThreadError> {
    let thread = conn.query_row(
        "INSERT INTO threads (id, user_id, name) VALUES (?1, ?2, ?3)
         RETURNING id, user_id, name, archived_at, created_at",
        params![id, user_id, name],
        map_row_to_thread,
    )?;
    Ok(thread)
}

/// Retrieves a thread by ID.
pub fn get_thread(conn: &Connection, thread_id: &str) -> Result<Thread, ThreadError> {
    conn.query_row(
        "SELECT id, user_id, name, archived_at, created_at FROM threads WHERE id = ?1",
        [thread_id],
        map_row_to_thread,
    )
    .optional()?
    .ok_or_else(|| ThreadError::ThreadNotFound(thread_id.to_string()))
}

/// Lists a user's threads, most recently created first.
pub fn list_threads(conn: &Connection, user_id: &str) -> Result<Vec<Thread>, ThreadError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, archived_at, created_at
         FROM threads WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([user_id], map_row_to_thread)?;
    let mut threads = Vec::new();
    for row in rows {
        threads.push(row?);
    }
    Ok(threads)
}

/// Renames a thread.
pub fn rename_thread(conn: &Connection, thread_id: &str, name: &str) -> Result<(), ThreadError> {
    let count = conn.execute(
        "UPDATE threads SET name = ?2 WHERE id = ?1",
        params![thread_id, name],
    )?;
    if count == 0 {
        return Err(ThreadError::ThreadNotFound(thread_id.to_string()));
    }
    Ok(())
}

/// Archives or unarchives a thread by toggling the nullable timestamp.
pub fn set_archived(conn: &Connection, thread_id: &str, archived: bool) -> Result<(), ThreadError> {
    let count = if archived {
        conn.execute(
            "UPDATE threads SET archived_at = datetime('now') WHERE id = ?1",
            [thread_id],
        )?
    } else {
        conn.execute(
            "UPDATE threads SET archived_at = NULL WHERE id = ?1",
            [thread_id],
        )?
    };
    if count == 0 {
        return Err(ThreadError::ThreadNotFound(thread_id.to_string()));
    }
    Ok(())
}

/// Deletes a thread; its messages go with it via the cascade constraint.
pub fn delete_thread(conn: &Connection, thread_id: &str) -> Result<(), ThreadError> {
    let count = conn.execute("DELETE FROM threads WHERE id = ?1", [thread_id])?;
    if count == 0 {
        return Err(ThreadError::ThreadNotFound(thread_id.to_string()));
    }
    Ok(())
}

/// Resolves the owning user of a thread.
///
/// The pronunciation worker uses this to attribute phoneme statistics; it is
/// the only thread access the worker needs.
pub fn thread_owner(conn: &Connection, thread_id: &str) -> Result<String, ThreadError> {
    conn.query_row(
        "SELECT user_id FROM threads WHERE id = ?1",
        [thread_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ThreadError::ThreadNotFound(thread_id.to_string()))
}

/// Creates a new message.
pub fn create_message(conn: &Connection, params: &NewMessage) -> Result<Message, ThreadError> {
    let message = conn.query_row(
        "INSERT INTO messages (
            id, thread_id, role, content, audio_key, audio_duration_seconds,
            has_audio, pronunciation_status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING id, thread_id, role, content, audio_key, audio_duration_seconds,
                  has_audio, created_at, pronunciation_status,
                  pronunciation_analysis_json, pronunciation_error",
        params![
            params.id,
            params.thread_id,
            params.role.as_str(),
            params.content,
            params.audio_key,
            params.audio_duration_seconds,
            params.has_audio,
            params.pronunciation_status.as_str(),
        ],
        map_row_to_message,
    )?;
    Ok(message)
}

/// Retrieves a message by ID.
pub fn get_message(conn: &Connection, message_id: &str) -> Result<Message, ThreadError> {
    conn.query_row(
        "SELECT id, thread_id, role, content, audio_key, audio_duration_seconds,
                has_audio, created_at, pronunciation_status,
                pronunciation_analysis_json, pronunciation_error
         FROM messages WHERE id = ?1",
        [message_id],
        map_row_to_message,
    )
    .optional()?
    .ok_or_else(|| ThreadError::MessageNotFound(message_id.to_string()))
}

/// Lists a thread's messages in chronological (insertion) order.
///
/// `rowid` breaks ties between messages created within the same second, so a
/// user message always precedes the assistant reply persisted moments later.
pub fn list_messages(conn: &Connection, thread_id: &str) -> Result<Vec<Message>, ThreadError> {
    let mut stmt = conn.prepare(
        "SELECT id, thread_id, role, content, audio_key, audio_duration_seconds,
                has_audio, created_at, pronunciation_status,
                pronunciation_analysis_json, pronunciation_error
         FROM messages WHERE thread_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([thread_id], map_row_to_message)?;
    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Atomically claims a pending message for pronunciation analysis.
///
/// Returns `true` if this caller won the claim. A second dispatch for the
/// same message (an upstream retry, say) sees zero rows affected and must
/// exit without side effects — this is what keeps phoneme statistics from
/// double counting.
pub fn claim_pronunciation(conn: &Connection, message_id: &str) -> Result<bool, ThreadError> {
    let count = conn.execute(
        "UPDATE messages SET pronunciation_started_at = datetime('now')
         WHERE id = ?1
           AND pronunciation_status = 'pending'
           AND pronunciation_started_at IS NULL",
        [message_id],
    )?;
    Ok(count == 1)
}

/// Persists a scoring result and moves the sub-record to `complete`.
///
/// The guard on `pronunciation_status` makes the transition monotonic: a
/// message that already reached a terminal state is left untouched and the
/// call reports zero rows via `Ok(false)`.
pub fn complete_pronunciation(
    conn: &Connection,
    message_id: &str,
    analysis: &PronunciationAnalysis,
) -> Result<bool, ThreadError> {
    let analysis_json = serde_json::to_string(analysis)?;
    let count = conn.execute(
        "UPDATE messages
         SET pronunciation_status = 'complete',
             pronunciation_analysis_json = ?2,
             pronunciation_error = NULL,
             pronunciation_updated_at = datetime('now')
         WHERE id = ?1 AND pronunciation_status = 'pending'",
        params![message_id, analysis_json],
    )?;
    Ok(count == 1)
}

/// Records a scoring failure and moves the sub-record to `failed`.
///
/// `error` is the human-readable `"<CODE>: <detail>"` string. Same
/// monotonicity guard as [`complete_pronunciation`].
pub fn fail_pronunciation(
    conn: &Connection,
    message_id: &str,
    error: &str,
) -> Result<bool, ThreadError> {
    let count = conn.execute(
        "UPDATE messages
         SET pronunciation_status = 'failed',
             pronunciation_error = ?2,
             pronunciation_updated_at = datetime('now')
         WHERE id = ?1 AND pronunciation_status = 'pending'",
        params![message_id, error],
    )?;
    Ok(count == 1)
}

fn map_row_to_thread(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        archived_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    let role: Role = role_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_str: String = row.get(8)?;
    let pronunciation_status: PronunciationStatus = status_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let analysis_json: Option<String> = row.get(9)?;
    let pronunciation_analysis = match analysis_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Message {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        role,
        content: row.get(3)?,
        audio_key: row.get(4)?,
        audio_duration_seconds: row.get(5)?,
        has_audio: row.get(6)?,
        created_at: row.get(7)?,
        pronunciation_status,
        pronunciation_analysis,
        pronunciation_error: row.get(10)?,
    })
}
