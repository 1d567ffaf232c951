//! Phoneme statistics handler.

use axum::{extract::Extension, Json};
use lingua_stats::UserStats;
use std::sync::Arc;

use crate::api::{internal, ApiError};
use crate::middleware::UserContext;
use crate::AppState;

/// Handler for `GET /api/stats/phonemes`.
pub async fn get_user_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        Ok::<_, ApiError>(lingua_stats::user_stats(&conn, &user.user_id)?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(stats))
}
