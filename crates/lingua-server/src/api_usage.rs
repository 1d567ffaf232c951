//! Usage event query handler — the billing reconciliation surface.

use axum::{
    extract::{Extension, Query},
    Json,
};
use lingua_observe::{EventFilter, UsageDomain, UsageEvent};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{internal, ApiError};
use crate::middleware::UserContext;
use crate::AppState;

/// Query parameters for `GET /api/usage/events`.
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Handler for `GET /api/usage/events`.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<UsageEvent>>, ApiError> {
    let domain = match query.domain.as_deref() {
        Some(label) => Some(
            label
                .parse::<UsageDomain>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };
    let filter = EventFilter {
        domain,
        event_type: query.event_type,
        entity_id: query.entity_id,
        since: query.since,
        limit: query.limit,
    };

    let events = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        Ok::<_, ApiError>(lingua_observe::query_events(
            &conn,
            &user.user_id,
            &filter,
        )?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(events))
}
