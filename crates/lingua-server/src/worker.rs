//! Detached pronunciation analysis worker.
//!
//! Dispatched once per accepted user message, after the message row is
//! durable. The first thing the worker does is claim the message with an
//! atomic guarded UPDATE; a dispatch that loses the claim exits without any
//! side effects, which is what keeps a double dispatch from double-counting
//! phoneme statistics. Failures are recorded on the message as
//! `"<CODE>: <detail>"` and never propagate anywhere — the turn that spawned
//! the worker has long since returned.

use std::sync::Arc;
use std::time::Duration;

use lingua_observe::UsageEventPayload;
use lingua_speech::Audience;
use lingua_types::{PronunciationAnalysis, ANALYSIS_SCHEMA_VERSION};

use crate::AppState;

#[derive(Debug, thiserror::Error)]
enum WorkerError {
    #[error("db connection failed: {0}")]
    Pool(String),
    #[error(transparent)]
    Thread(#[from] lingua_threads::ThreadError),
    #[error(transparent)]
    Stats(#[from] lingua_stats::StatsError),
}

/// Wall-clock budget for one analysis, scoring call included.
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// TTL of the signed URL handed to the scorer. Generous because the scorer
/// may queue the clip before downloading it.
const SCORER_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// Spawns a detached analysis task for a freshly persisted user message.
pub fn spawn_analysis(
    state: Arc<AppState>,
    message_id: String,
    audio_key: String,
    expected_text: String,
) {
    tokio::spawn(async move {
        run_analysis(state, message_id, audio_key, expected_text).await;
    });
}

/// Runs one analysis end to end. Public so the integration suite can drive
/// the worker deterministically instead of racing a spawned task.
pub async fn run_analysis(
    state: Arc<AppState>,
    message_id: String,
    audio_key: String,
    expected_text: String,
) {
    // Claim before any work. Losing the claim means another dispatch for
    // this message is (or was) already running.
    let claimed = {
        let state = state.clone();
        let message_id = message_id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = state
                .pool
                .get()
                .map_err(|e| WorkerError::Pool(e.to_string()))?;
            Ok::<_, WorkerError>(lingua_threads::claim_pronunciation(&conn, &message_id)?)
        })
        .await
    };
    let claimed = match claimed {
        Ok(Ok(claimed)) => claimed,
        Ok(Err(e)) => {
            tracing::error!(message_id = %message_id, "analysis claim failed: {e}");
            return;
        }
        Err(e) => {
            tracing::error!(message_id = %message_id, "analysis claim task panicked: {e}");
            return;
        }
    };
    if !claimed {
        tracing::debug!(message_id = %message_id, "analysis already claimed, skipping");
        return;
    }

    let outcome = tokio::time::timeout(
        ANALYSIS_TIMEOUT,
        analyze(&state, &audio_key, &expected_text),
    )
    .await;

    match outcome {
        Ok(Ok(analysis)) => finish_success(&state, &message_id, analysis).await,
        Ok(Err(error)) => finish_failure(&state, &message_id, error).await,
        Err(_) => {
            finish_failure(
                &state,
                &message_id,
                format!(
                    "ML_SERVICE_ERROR: analysis timed out after {}s",
                    ANALYSIS_TIMEOUT.as_secs()
                ),
            )
            .await
        }
    }
}

/// The scoring call itself. Errors are already in `"<CODE>: <detail>"` form.
async fn analyze(
    state: &Arc<AppState>,
    audio_key: &str,
    expected_text: &str,
) -> Result<PronunciationAnalysis, String> {
    let audio_url = state
        .store
        .signed_url(audio_key, SCORER_URL_TTL, Audience::Internal)
        .map_err(|e| format!("PRESIGNED_URL_ERROR: {e}"))?;

    let response = state
        .scorer
        .analyze(&audio_url, expected_text, &state.language)
        .await
        .map_err(|e| format!("ML_SERVICE_ERROR: {e}"))?;

    if let Some(error) = response.error {
        return Err(format!("{}: {}", error.code, error.message));
    }
    match response.analysis {
        Some(mut analysis) if response.is_success() => {
            analysis.schema_version = ANALYSIS_SCHEMA_VERSION;
            Ok(analysis)
        }
        _ => Err("NO_ANALYSIS: scorer returned no analysis payload".to_string()),
    }
}

async fn finish_success(state: &Arc<AppState>, message_id: &str, analysis: PronunciationAnalysis) {
    let state = state.clone();
    let message_id = message_id.to_string();
    let result = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| WorkerError::Pool(e.to_string()))?;

        // The guarded UPDATE can still lose to a terminal state written in
        // between; in that case nothing else may be recorded either.
        if !lingua_threads::complete_pronunciation(&conn, &message_id, &analysis)? {
            tracing::warn!(message_id = %message_id, "analysis finished but message left pending state, discarding");
            return Ok(());
        }

        let message = lingua_threads::get_message(&conn, &message_id)?;
        let user_id = lingua_threads::thread_owner(&conn, &message.thread_id)?;
        lingua_stats::record_results(&conn, &user_id, &analysis.phoneme_details)?;
        crate::emit_usage(
            &conn,
            &user_id,
            &message_id,
            &UsageEventPayload::ScoringCompleted {
                phoneme_count: i64::from(analysis.phoneme_count),
                match_count: i64::from(analysis.match_count),
            },
        );
        tracing::info!(
            message_id = %message_id,
            phoneme_count = analysis.phoneme_count,
            match_count = analysis.match_count,
            "pronunciation analysis complete"
        );
        Ok::<_, WorkerError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("failed to persist analysis result: {e}"),
        Err(e) => tracing::error!("analysis persist task panicked: {e}"),
    }
}

async fn finish_failure(state: &Arc<AppState>, message_id: &str, error: String) {
    let state = state.clone();
    let message_id = message_id.to_string();
    let result = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| WorkerError::Pool(e.to_string()))?;

        if !lingua_threads::fail_pronunciation(&conn, &message_id, &error)? {
            tracing::warn!(message_id = %message_id, "analysis failure arrived after terminal state, discarding");
            return Ok(());
        }

        let (code, detail) = match error.split_once(": ") {
            Some((code, detail)) => (code.to_string(), detail.to_string()),
            None => ("UNKNOWN".to_string(), error.clone()),
        };
        let message = lingua_threads::get_message(&conn, &message_id)?;
        let user_id = lingua_threads::thread_owner(&conn, &message.thread_id)?;
        crate::emit_usage(
            &conn,
            &user_id,
            &message_id,
            &UsageEventPayload::ScoringFailed {
                error_code: code.clone(),
                detail,
            },
        );
        tracing::warn!(message_id = %message_id, code = %code, "pronunciation analysis failed");
        Ok::<_, WorkerError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("failed to record analysis failure: {e}"),
        Err(e) => tracing::error!("analysis failure task panicked: {e}"),
    }
}
