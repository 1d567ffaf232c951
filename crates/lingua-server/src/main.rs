//! Lingua server binary — the voice-conversation backend entry point.
//!
//! Starts an axum HTTP server with structured logging, database
//! initialization, and graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use lingua_server::{app, config, AppState};
use lingua_speech::{
    FsObjectStore, HttpPronunciationScorer, HttpReplyGenerator, HttpSpeechSynthesizer,
    HttpSpeechToText,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("LINGUA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = lingua_db::create_pool(
        &config.database.path,
        lingua_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = lingua_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    // Wire up storage and external services
    let media = Arc::new(FsObjectStore::new(
        &config.storage.root,
        config.server.public_base_url.clone(),
        config.server.internal_base_url.clone(),
        config.storage.secret.as_bytes().to_vec(),
    ));
    let stt = HttpSpeechToText::new(config.services.stt_url.clone())
        .expect("failed to build speech-to-text client");
    let generator = HttpReplyGenerator::new(config.services.ml_url.clone())
        .expect("failed to build reply generation client");
    let synthesizer = HttpSpeechSynthesizer::new(config.services.tts_url.clone())
        .expect("failed to build speech synthesis client");
    let scorer = HttpPronunciationScorer::new(config.services.ml_url.clone())
        .expect("failed to build pronunciation scoring client");

    let state = AppState {
        pool,
        store: media.clone(),
        media,
        stt: Arc::new(stt),
        generator: Arc::new(generator),
        synthesizer: Arc::new(synthesizer),
        scorer: Arc::new(scorer),
        credit_cost_per_turn: config.billing.credit_cost_per_turn,
        max_audio_bytes: config.billing.max_audio_bytes,
        language: config.services.language.clone(),
    };

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting lingua server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("lingua server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
