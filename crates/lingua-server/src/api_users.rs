//! Account creation.

use axum::{extract::Extension, Json};
use lingua_credits::UserCredits;
use lingua_types::SubscriptionTier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{internal, ApiError};
use crate::AppState;

/// Request body for `POST /api/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub display_name: String,
    /// Subscription tier label; unrecognized values fall back to `free`.
    #[serde(default)]
    pub tier: Option<String>,
}

/// Response body for `POST /api/users`.
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub display_name: String,
    pub credits: UserCredits,
}

/// Handler for `POST /api/users`.
///
/// Creates the account row and its initial credits grant in one transaction,
/// so an account can never exist without a ledger.
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, ApiError> {
    let display_name = payload.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("display_name is required".to_string()));
    }
    let tier = SubscriptionTier::from_label_or_free(payload.tier.as_deref().unwrap_or("free"));

    let result = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        let user_id = Uuid::new_v4().to_string();

        let tx = conn.unchecked_transaction().map_err(internal)?;
        tx.execute(
            "INSERT INTO users (id, display_name) VALUES (?1, ?2)",
            rusqlite::params![user_id, display_name],
        )
        .map_err(internal)?;
        let credits = lingua_credits::initialize(&tx, &user_id, tier)?;
        tx.commit().map_err(internal)?;

        tracing::info!(user_id = %user_id, tier = %tier, "user created");
        Ok::<_, ApiError>(CreateUserResponse {
            user_id,
            display_name,
            credits,
        })
    })
    .await
    .map_err(internal)??;

    Ok(Json(result))
}
