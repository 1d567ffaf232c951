//! The conversation turn orchestrator.
//!
//! One call to [`process_turn`] takes a raw audio clip through the whole
//! pipeline: storage, transcription, duration checks, persistence, detached
//! pronunciation scoring, reply generation, synthesis, and billing. The
//! failure policy is deliberately uneven: everything up to the user message
//! persisting is fatal, synthesis and storage of the reply audio degrade the
//! turn to text-only, and a billing failure after a successful turn is
//! recorded for reconciliation but never rolls the turn back.

use std::sync::Arc;
use std::time::Duration;

use lingua_observe::UsageEventPayload;
use lingua_speech::{Audience, SpeechError};
use lingua_threads::{Message, NewMessage, ThreadError};
use lingua_types::{ChatMessage, PronunciationStatus, Role};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::ApiError;
use crate::{worker, AppState};

/// Shortest clip worth scoring, inclusive.
pub const MIN_AUDIO_SECONDS: f64 = 1.0;
/// Longest accepted clip, inclusive.
pub const MAX_AUDIO_SECONDS: f64 = 30.0;

/// TTL of the signed URL handed to the transcription service.
const STT_URL_TTL: Duration = Duration::from_secs(5 * 60);

/// A completed turn: the persisted user message and the assistant's reply.
#[derive(Debug, Serialize)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub assistant_message: Message,
}

/// Errors that abort a turn before the assistant reply exists.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("audio exceeds maximum size: {size} bytes (limit {limit})")]
    AudioTooLarge { size: usize, limit: usize },
    #[error("audio too short: {duration:.2}s (minimum {MIN_AUDIO_SECONDS}s)")]
    AudioTooShort { duration: f64 },
    #[error("audio too long: {duration:.2}s (maximum {MAX_AUDIO_SECONDS}s)")]
    AudioTooLong { duration: f64 },
    #[error("audio upload failed: {0}")]
    Upload(SpeechError),
    #[error("transcription failed: {0}")]
    Transcription(SpeechError),
    #[error("reply generation failed: {0}")]
    Generation(SpeechError),
    #[error(transparent)]
    Thread(#[from] ThreadError),
    #[error("{0}")]
    Internal(String),
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::AudioTooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            TurnError::AudioTooShort { .. } | TurnError::AudioTooLong { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            TurnError::Upload(_) | TurnError::Transcription(_) | TurnError::Generation(_) => {
                ApiError::ServiceUnavailable(e.to_string())
            }
            TurnError::Thread(inner) => inner.into(),
            TurnError::Internal(msg) => ApiError::InternalServerError(msg),
        }
    }
}

/// Runs one voice turn for `user_id` in `thread_id`.
///
/// The caller has already checked thread ownership and done the credits
/// pre-check; this function charges after the turn succeeds.
pub async fn process_turn(
    state: Arc<AppState>,
    user_id: &str,
    thread_id: &str,
    audio: Vec<u8>,
) -> Result<TurnOutcome, TurnError> {
    // 1. Size guard before any I/O.
    if audio.len() > state.max_audio_bytes {
        return Err(TurnError::AudioTooLarge {
            size: audio.len(),
            limit: state.max_audio_bytes,
        });
    }

    let user_message_id = Uuid::new_v4().to_string();
    let audio_key = format!("user/{thread_id}/{user_message_id}.webm");

    // 2. Store the clip; nothing downstream works without it.
    state
        .store
        .put(&audio_key, &audio, "audio/webm")
        .await
        .map_err(TurnError::Upload)?;

    // 3. Transcribe via a short-lived signed URL.
    let stt_url = state
        .store
        .signed_url(&audio_key, STT_URL_TTL, Audience::External)
        .map_err(TurnError::Upload)?;
    let transcription = state
        .stt
        .transcribe(&stt_url)
        .await
        .map_err(TurnError::Transcription)?;

    // 4. Duration guards, bounds inclusive.
    let duration = transcription.duration_seconds;
    if duration < MIN_AUDIO_SECONDS {
        return Err(TurnError::AudioTooShort { duration });
    }
    if duration > MAX_AUDIO_SECONDS {
        return Err(TurnError::AudioTooLong { duration });
    }

    // 5. Persist the user message before anything that can still fail, so a
    //    later abort leaves the user's utterance in the thread.
    let user_message = {
        let new_message = NewMessage {
            id: user_message_id.clone(),
            thread_id: thread_id.to_string(),
            role: Role::User,
            content: transcription.text.clone(),
            audio_key: Some(audio_key.clone()),
            audio_duration_seconds: Some(duration),
            has_audio: true,
            pronunciation_status: PronunciationStatus::Pending,
        };
        run_blocking(state.clone(), move |conn| {
            Ok(lingua_threads::create_message(conn, &new_message)?)
        })
        .await?
    };

    // 6. Detached scoring dispatch, only after the durable persist.
    worker::spawn_analysis(
        state.clone(),
        user_message_id.clone(),
        audio_key,
        transcription.text.clone(),
    );

    // 7. Chronological history, user message included.
    let history = {
        let thread_id = thread_id.to_string();
        run_blocking(state.clone(), move |conn| {
            Ok(lingua_threads::list_messages(conn, &thread_id)?)
        })
        .await?
    };
    let chat_history: Vec<ChatMessage> = history
        .into_iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content,
        })
        .collect();

    // 8. Reply generation is fatal: the user message stays, the turn fails.
    let reply = state
        .generator
        .generate(&chat_history)
        .await
        .map_err(TurnError::Generation)?;

    // 9–10. Synthesis and reply-audio storage degrade to text-only.
    let assistant_message_id = Uuid::new_v4().to_string();
    let assistant_key = format!("assistant/{thread_id}/{assistant_message_id}.mp3");
    let mut assistant_audio: Option<(String, f64)> = None;
    match state.synthesizer.synthesize(&reply).await {
        Ok(speech) => match state.store.put(&assistant_key, &speech.audio, "audio/mpeg").await {
            Ok(()) => assistant_audio = Some((assistant_key, speech.duration_seconds)),
            Err(e) => {
                tracing::warn!(message_id = %assistant_message_id, "reply audio upload failed, sending text-only: {e}");
            }
        },
        Err(e) => {
            tracing::warn!(message_id = %assistant_message_id, "speech synthesis failed, sending text-only: {e}");
        }
    }

    // 11. Persist the assistant message.
    let assistant_message = {
        let (audio_key, audio_duration_seconds) = match assistant_audio {
            Some((key, dur)) => (Some(key), Some(dur)),
            None => (None, None),
        };
        let new_message = NewMessage {
            id: assistant_message_id.clone(),
            thread_id: thread_id.to_string(),
            role: Role::Assistant,
            content: reply,
            has_audio: audio_key.is_some(),
            audio_key,
            audio_duration_seconds,
            pronunciation_status: PronunciationStatus::None,
        };
        run_blocking(state.clone(), move |conn| {
            Ok(lingua_threads::create_message(conn, &new_message)?)
        })
        .await?
    };

    // 12. Charge for the turn. The turn already succeeded; a failed debit is
    //     a reconciliation event, not an error the caller sees.
    charge_turn(&state, user_id, thread_id, &assistant_message.id).await;

    Ok(TurnOutcome {
        user_message,
        assistant_message,
    })
}

async fn charge_turn(state: &Arc<AppState>, user_id: &str, thread_id: &str, message_id: &str) {
    let state = state.clone();
    let cost = state.credit_cost_per_turn;
    let user_id = user_id.to_string();
    let thread_id = thread_id.to_string();
    let message_id = message_id.to_string();

    let result = tokio::task::spawn_blocking(move || {
        let conn = match state.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(user_id = %user_id, message_id = %message_id, "billing skipped, no db connection: {e}");
                return;
            }
        };
        match lingua_credits::deduct(&conn, &user_id, cost, Some(&message_id), "Voice turn") {
            Ok(credits) => {
                crate::emit_usage(
                    &conn,
                    &user_id,
                    &message_id,
                    &UsageEventPayload::TurnBilled {
                        thread_id,
                        cost,
                        balance_after: credits.balance,
                    },
                );
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    message_id = %message_id,
                    cost,
                    "turn delivered but debit failed, needs reconciliation: {e}"
                );
                crate::emit_usage(
                    &conn,
                    &user_id,
                    &message_id,
                    &UsageEventPayload::DebitFailed {
                        thread_id,
                        cost,
                        reason: e.to_string(),
                    },
                );
            }
        }
    })
    .await;

    if let Err(e) = result {
        tracing::error!("billing task panicked: {e}");
    }
}

pub(crate) async fn run_blocking<T, F>(state: Arc<AppState>, f: F) -> Result<T, TurnError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, TurnError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| TurnError::Internal(e.to_string()))?;
        f(&conn)
    })
    .await
    .map_err(|e| TurnError::Internal(e.to_string()))?
}
