//! Shared harness for server integration tests: a file-backed pool in a
//! temp directory, a real filesystem object store, and scripted stand-ins
//! for the external speech services.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lingua_db::DbRuntimeSettings;
use lingua_server::AppState;
use lingua_speech::{
    FsObjectStore, PronunciationScorer, ReplyGenerator, SpeechError, SpeechSynthesizer,
    SpeechToText,
};
use lingua_types::{
    ChatMessage, PronunciationStatus, Role, ScorerResponse, SubscriptionTier, SynthesizedSpeech,
    Transcription,
};
use tempfile::TempDir;

pub struct StubStt {
    pub text: String,
    pub duration: f64,
    pub fail: bool,
}

impl StubStt {
    pub fn ok(text: &str, duration: f64) -> Self {
        Self {
            text: text.to_string(),
            duration,
            fail: false,
        }
    }
}

#[async_trait]
impl SpeechToText for StubStt {
    async fn transcribe(&self, _audio_url: &str) -> Result<Transcription, SpeechError> {
        if self.fail {
            return Err(SpeechError::UnexpectedStatus {
                status: 503,
                detail: "stt down".to_string(),
            });
        }
        Ok(Transcription {
            text: self.text.clone(),
            language: "en-us".to_string(),
            duration_seconds: self.duration,
        })
    }
}

pub struct StubGenerator {
    pub reply: String,
    pub fail: bool,
}

impl StubGenerator {
    pub fn ok(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
        }
    }
}

#[async_trait]
impl ReplyGenerator for StubGenerator {
    async fn generate(&self, _history: &[ChatMessage]) -> Result<String, SpeechError> {
        if self.fail {
            return Err(SpeechError::UnexpectedStatus {
                status: 500,
                detail: "generator down".to_string(),
            });
        }
        Ok(self.reply.clone())
    }
}

pub struct StubSynthesizer {
    pub audio: Vec<u8>,
    pub duration: f64,
    pub fail: bool,
}

impl StubSynthesizer {
    pub fn ok() -> Self {
        Self {
            audio: b"mp3 bytes".to_vec(),
            duration: 2.0,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            audio: Vec::new(),
            duration: 0.0,
            fail: true,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for StubSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SynthesizedSpeech, SpeechError> {
        if self.fail {
            return Err(SpeechError::UnexpectedStatus {
                status: 500,
                detail: "tts down".to_string(),
            });
        }
        Ok(SynthesizedSpeech {
            audio: self.audio.clone(),
            duration_seconds: self.duration,
        })
    }
}

pub enum ScorerScript {
    Respond(ScorerResponse),
    TransportError,
    /// Never resolves; keeps background analyses parked for the test's life.
    Hang,
}

pub struct StubScorer {
    pub script: ScorerScript,
}

impl StubScorer {
    pub fn hang() -> Self {
        Self {
            script: ScorerScript::Hang,
        }
    }

    pub fn respond(response: ScorerResponse) -> Self {
        Self {
            script: ScorerScript::Respond(response),
        }
    }
}

#[async_trait]
impl PronunciationScorer for StubScorer {
    async fn analyze(
        &self,
        _audio_url: &str,
        _expected_text: &str,
        _language: &str,
    ) -> Result<ScorerResponse, SpeechError> {
        match &self.script {
            ScorerScript::Respond(response) => Ok(response.clone()),
            ScorerScript::TransportError => Err(SpeechError::UnexpectedStatus {
                status: 503,
                detail: "scorer down".to_string(),
            }),
            ScorerScript::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    _tmp: TempDir,
}

pub fn build_app(
    stt: StubStt,
    generator: StubGenerator,
    synthesizer: StubSynthesizer,
    scorer: StubScorer,
) -> TestApp {
    let tmp = tempfile::tempdir().expect("tempdir");
    let db_path = tmp.path().join("test.db");
    let pool = lingua_db::create_pool(
        db_path.to_str().expect("utf8 path"),
        DbRuntimeSettings {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        },
    )
    .expect("pool");
    {
        let conn = pool.get().expect("conn");
        lingua_db::run_migrations(&conn).expect("migrations");
    }

    let media = Arc::new(FsObjectStore::new(
        tmp.path().join("media"),
        "http://public.test",
        "http://internal.test",
        b"test-secret".to_vec(),
    ));

    let state = Arc::new(AppState {
        pool,
        store: media.clone(),
        media,
        stt: Arc::new(stt),
        generator: Arc::new(generator),
        synthesizer: Arc::new(synthesizer),
        scorer: Arc::new(scorer),
        credit_cost_per_turn: 1,
        max_audio_bytes: 1024 * 1024,
        language: "en-us".to_string(),
    });

    TestApp { state, _tmp: tmp }
}

pub fn create_user(state: &AppState, user_id: &str, tier: SubscriptionTier) {
    let conn = state.pool.get().expect("conn");
    conn.execute(
        "INSERT INTO users (id, display_name) VALUES (?1, ?2)",
        rusqlite::params![user_id, "Test User"],
    )
    .expect("insert user");
    lingua_credits::initialize(&conn, user_id, tier).expect("initialize credits");
}

pub fn create_thread(state: &AppState, thread_id: &str, user_id: &str) {
    let conn = state.pool.get().expect("conn");
    lingua_threads::create_thread(&conn, thread_id, user_id, None).expect("create thread");
}

pub fn create_pending_message(
    state: &AppState,
    thread_id: &str,
    message_id: &str,
    text: &str,
) -> String {
    let conn = state.pool.get().expect("conn");
    let audio_key = format!("user/{thread_id}/{message_id}.webm");
    lingua_threads::create_message(
        &conn,
        &lingua_threads::NewMessage {
            id: message_id.to_string(),
            thread_id: thread_id.to_string(),
            role: Role::User,
            content: text.to_string(),
            audio_key: Some(audio_key.clone()),
            audio_duration_seconds: Some(2.0),
            has_audio: true,
            pronunciation_status: PronunciationStatus::Pending,
        },
    )
    .expect("create message");
    audio_key
}

/// Polls until the message leaves `pending` or the deadline passes. The
/// worker spawned by a turn runs detached, so turn tests that care about its
/// outcome wait on the row rather than the task.
pub async fn wait_for_terminal_status(
    state: &AppState,
    message_id: &str,
) -> lingua_threads::Message {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let message = {
            let conn = state.pool.get().expect("conn");
            lingua_threads::get_message(&conn, message_id).expect("get message")
        };
        if message.pronunciation_status != PronunciationStatus::Pending {
            return message;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "message {message_id} never left pending"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Builds a `multipart/form-data` body with a single `audio` field.
pub fn multipart_audio_body(boundary: &str, audio: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"audio\"; filename=\"clip.webm\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: audio/webm\r\n\r\n");
    body.extend_from_slice(audio);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
