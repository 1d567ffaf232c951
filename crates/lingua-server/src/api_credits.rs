//! Credits balance and transaction history handlers.

use axum::{
    extract::{Extension, Query},
    Json,
};
use lingua_credits::{CreditTransaction, UserCredits};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{internal, ApiError};
use crate::middleware::UserContext;
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

/// Query parameters for `GET /api/credits/transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Handler for `GET /api/credits`.
pub async fn get_credits_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<UserCredits>, ApiError> {
    let credits = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        Ok::<_, ApiError>(lingua_credits::get_credits(&conn, &user.user_id)?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(credits))
}

/// Handler for `GET /api/credits/transactions`, newest first.
pub async fn list_transactions_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CreditTransaction>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let history = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        Ok::<_, ApiError>(lingua_credits::transaction_history(
            &conn,
            &user.user_id,
            limit,
        )?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(history))
}
