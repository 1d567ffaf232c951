//! Thread CRUD and message history handlers.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use lingua_threads::{Message, Thread};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{internal, ApiError};
use crate::middleware::UserContext;
use crate::AppState;

/// Request body for `POST /api/threads`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for `PATCH /api/threads/{threadId}`.
#[derive(Debug, Deserialize)]
pub struct UpdateThreadRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
}

/// Looks up a thread and checks the caller owns it.
///
/// Foreign threads come back as NotFound rather than Forbidden so the API
/// does not confirm their existence.
pub(crate) fn owned_thread(
    conn: &rusqlite::Connection,
    thread_id: &str,
    user_id: &str,
) -> Result<Thread, ApiError> {
    let thread = lingua_threads::get_thread(conn, thread_id)?;
    if thread.user_id != user_id {
        return Err(ApiError::NotFound(format!("thread not found: {thread_id}")));
    }
    Ok(thread)
}

/// Handler for `POST /api/threads`.
pub async fn create_thread_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    payload: Option<Json<CreateThreadRequest>>,
) -> Result<Json<Thread>, ApiError> {
    let name = payload.and_then(|Json(p)| p.name);

    let thread = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        let thread_id = Uuid::new_v4().to_string();
        let thread =
            lingua_threads::create_thread(&conn, &thread_id, &user.user_id, name.as_deref())?;
        Ok::<_, ApiError>(thread)
    })
    .await
    .map_err(internal)??;

    Ok(Json(thread))
}

/// Handler for `GET /api/threads`.
pub async fn list_threads_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<Thread>>, ApiError> {
    let threads = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        Ok::<_, ApiError>(lingua_threads::list_threads(&conn, &user.user_id)?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(threads))
}

/// Handler for `GET /api/threads/{threadId}`.
pub async fn get_thread_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(thread_id): Path<String>,
) -> Result<Json<Thread>, ApiError> {
    let thread = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        owned_thread(&conn, &thread_id, &user.user_id)
    })
    .await
    .map_err(internal)??;

    Ok(Json(thread))
}

/// Handler for `PATCH /api/threads/{threadId}` (rename and archive toggle).
pub async fn update_thread_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(thread_id): Path<String>,
    Json(payload): Json<UpdateThreadRequest>,
) -> Result<Json<Thread>, ApiError> {
    let thread = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        owned_thread(&conn, &thread_id, &user.user_id)?;
        if let Some(ref name) = payload.name {
            lingua_threads::rename_thread(&conn, &thread_id, name)?;
        }
        if let Some(archived) = payload.archived {
            lingua_threads::set_archived(&conn, &thread_id, archived)?;
        }
        Ok::<_, ApiError>(lingua_threads::get_thread(&conn, &thread_id)?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(thread))
}

/// Handler for `DELETE /api/threads/{threadId}`. Messages cascade.
pub async fn delete_thread_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        owned_thread(&conn, &thread_id, &user.user_id)?;
        lingua_threads::delete_thread(&conn, &thread_id)?;
        Ok::<_, ApiError>(())
    })
    .await
    .map_err(internal)??;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `GET /api/threads/{threadId}/messages` (chronological order).
pub async fn list_messages_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(internal)?;
        owned_thread(&conn, &thread_id, &user.user_id)?;
        Ok::<_, ApiError>(lingua_threads::list_messages(&conn, &thread_id)?)
    })
    .await
    .map_err(internal)??;

    Ok(Json(messages))
}
