//! Signed media URL minting and signed-URL serving.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use lingua_speech::{Audience, ObjectStore, SpeechError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{internal, ApiError};
use crate::middleware::UserContext;
use crate::AppState;

/// Playback URLs live long enough for a user to revisit a thread.
const PLAYBACK_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Response body for `GET /api/audio/{key}`.
#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

/// Query parameters carried by a signed media URL.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub expires: i64,
    pub sig: String,
}

/// Handler for `GET /api/audio/{key}`.
///
/// Mints an external-audience signed URL for a clip the caller owns. Keys
/// embed the thread ID (`user/{thread}/{msg}.webm`), so ownership is checked
/// against the thread segment.
pub async fn signed_audio_url_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(user): Extension<UserContext>,
    Path(key): Path<String>,
) -> Result<Json<SignedUrlResponse>, ApiError> {
    let thread_id = key
        .split('/')
        .nth(1)
        .ok_or_else(|| ApiError::BadRequest(format!("malformed audio key: {key}")))?
        .to_string();

    {
        let state = state.clone();
        let user_id = user.user_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = state.pool.get().map_err(internal)?;
            crate::api_threads::owned_thread(&conn, &thread_id, &user_id)?;
            Ok::<_, ApiError>(())
        })
        .await
        .map_err(internal)??;
    }

    let url = state
        .store
        .signed_url(&key, PLAYBACK_URL_TTL, Audience::External)
        .map_err(|e| match e {
            SpeechError::InvalidKey(k) => ApiError::BadRequest(format!("invalid audio key: {k}")),
            other => ApiError::InternalServerError(other.to_string()),
        })?;

    Ok(Json(SignedUrlResponse {
        url,
        expires_in_seconds: PLAYBACK_URL_TTL.as_secs(),
    }))
}

/// Handler for `GET /media/{key}` — verifies the signature and serves bytes.
///
/// Unauthenticated by design: the signature is the credential.
pub async fn serve_media_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ApiError> {
    if !state.media.verify(&key, query.expires, &query.sig) {
        return Err(ApiError::NotFound("invalid or expired media url".to_string()));
    }

    let data = state.media.get(&key).await.map_err(|e| match e {
        SpeechError::Storage(io) if io.kind() == std::io::ErrorKind::NotFound => {
            ApiError::NotFound(format!("no such object: {key}"))
        }
        SpeechError::InvalidKey(k) => ApiError::BadRequest(format!("invalid media key: {k}")),
        other => ApiError::InternalServerError(other.to_string()),
    })?;

    let content_type = if key.ends_with(".mp3") {
        "audio/mpeg"
    } else {
        "audio/webm"
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        data,
    )
        .into_response())
}
