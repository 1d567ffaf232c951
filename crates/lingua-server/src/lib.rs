//! Lingua server library logic.

pub mod api;
pub mod api_audio;
pub mod api_credits;
pub mod api_stats;
pub mod api_threads;
pub mod api_turns;
pub mod api_usage;
pub mod api_users;
pub mod config;
pub mod middleware;
pub mod turn;
pub mod worker;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use lingua_db::DbPool;
use lingua_speech::{
    FsObjectStore, ObjectStore, PronunciationScorer, ReplyGenerator, SpeechSynthesizer,
    SpeechToText,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Audio object storage.
    pub store: Arc<dyn ObjectStore>,
    /// Concrete media store for `/media` signature verification. In
    /// production this is the same instance as `store`.
    pub media: Arc<FsObjectStore>,
    /// Speech-to-text service.
    pub stt: Arc<dyn SpeechToText>,
    /// Conversational reply service.
    pub generator: Arc<dyn ReplyGenerator>,
    /// Text-to-speech service.
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Pronunciation-scoring service.
    pub scorer: Arc<dyn PronunciationScorer>,
    /// Credits charged per completed voice turn.
    pub credit_cost_per_turn: i64,
    /// Maximum accepted audio upload size in bytes.
    pub max_audio_bytes: usize,
    /// Language code passed to the pronunciation scorer.
    pub language: String,
}

/// Records a usage event, logging rather than propagating failures.
///
/// The event log is an audit surface; a write failure there must never fail
/// the operation being audited.
pub fn emit_usage(
    conn: &rusqlite::Connection,
    user_id: &str,
    entity_id: &str,
    payload: &lingua_observe::UsageEventPayload,
) {
    if let Err(e) = lingua_observe::emit_event(conn, user_id, entity_id, payload) {
        tracing::warn!(
            user_id,
            entity_id,
            event_type = payload.event_type(),
            "failed to emit usage event: {}",
            e
        );
    }
}

/// Maximum request body size for JSON routes (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Headroom added on top of `max_audio_bytes` for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/threads",
            post(api_threads::create_thread_handler).get(api_threads::list_threads_handler),
        )
        .route(
            "/api/threads/{threadId}",
            get(api_threads::get_thread_handler)
                .patch(api_threads::update_thread_handler)
                .delete(api_threads::delete_thread_handler),
        )
        .route(
            "/api/threads/{threadId}/messages",
            get(api_threads::list_messages_handler),
        )
        .route("/api/audio/{*key}", get(api_audio::signed_audio_url_handler))
        .route("/api/credits", get(api_credits::get_credits_handler))
        .route(
            "/api/credits/transactions",
            get(api_credits::list_transactions_handler),
        )
        .route("/api/stats/phonemes", get(api_stats::get_user_stats_handler))
        .route("/api/usage/events", get(api_usage::list_events_handler))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    // The turn route accepts audio uploads and needs a larger body limit;
    // the handler enforces the exact `max_audio_bytes` guard itself.
    let turn_routes = Router::new()
        .route(
            "/api/threads/{threadId}/turns",
            post(api_turns::create_turn_handler),
        )
        .layer(DefaultBodyLimit::max(
            state.max_audio_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(api_users::create_user_handler))
        .route("/media/{*key}", get(api_audio::serve_media_handler))
        .merge(protected_routes)
        .merge(turn_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
