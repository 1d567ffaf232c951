//! The orchestrator's HTTP entry point.

use axum::{
    extract::{Extension, Multipart, Path},
    Json,
};
use std::sync::Arc;

use crate::api::{internal, ApiError};
use crate::api_threads::owned_thread;
use crate::middleware::UserContext;
use crate::turn::{self, TurnOutcome};
use crate::AppState;

/// Handler for `POST /api/threads/{threadId}/turns`.
///
/// Expects a multipart form with an `audio` field carrying the recorded
/// clip. The credits pre-check happens before any pipeline work so a broke
/// account costs nothing; the actual charge lands after the turn succeeds.
pub async fn create_turn_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(thread_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TurnOutcome>, ApiError> {
    // Ownership and affordability checks up front.
    {
        let state = state.clone();
        let user_id = user.user_id.clone();
        let thread_id = thread_id.clone();
        let cost = state.credit_cost_per_turn;
        tokio::task::spawn_blocking(move || {
            let conn = state.pool.get().map_err(internal)?;
            owned_thread(&conn, &thread_id, &user_id)?;
            let credits = lingua_credits::get_credits(&conn, &user_id)?;
            if credits.balance < cost {
                return Err(ApiError::PaymentRequired("INSUFFICIENT_CREDITS".to_string()));
            }
            Ok::<_, ApiError>(())
        })
        .await
        .map_err(internal)??;
    }

    let mut audio: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read audio field: {e}")))?;
            audio = Some(bytes.to_vec());
        }
    }
    let audio = audio.ok_or_else(|| ApiError::BadRequest("missing audio field".to_string()))?;
    if audio.is_empty() {
        return Err(ApiError::BadRequest("audio field is empty".to_string()));
    }

    let outcome = turn::process_turn(state, &user.user_id, &thread_id, audio).await?;
    Ok(Json(outcome))
}
