//! HTTP surface tests driven through the router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use lingua_speech::{Audience, ObjectStore};
use lingua_types::SubscriptionTier;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

fn app_with_defaults() -> TestApp {
    build_app(
        StubStt::ok("hello", 2.0),
        StubGenerator::ok("reply"),
        StubSynthesizer::ok(),
        StubScorer::hang(),
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = app_with_defaults();
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn signup_creates_account_with_initial_grant() {
    let app = app_with_defaults();
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"display_name": "Ada", "tier": "basic"}"#,
                ))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["display_name"], "Ada");
    assert_eq!(json["credits"]["balance"], 400);

    // The row and the grant committed together.
    let user_id = json["user_id"].as_str().expect("user_id");
    let conn = app.state.pool.get().expect("conn");
    let credits = lingua_credits::get_credits(&conn, user_id).expect("credits");
    assert_eq!(credits.monthly_allowance, 400);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app_with_defaults();
    create_user(&app.state, "user-1", SubscriptionTier::Free);

    let router = lingua_server::app((*app.state).clone());
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/threads")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/threads")
                .header(header::AUTHORIZATION, "Bearer no-such-user")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn thread_lifecycle_over_http() {
    let app = app_with_defaults();
    create_user(&app.state, "user-1", SubscriptionTier::Free);
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/threads")
                .header(header::AUTHORIZATION, "Bearer user-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name": "Practice"}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let thread = body_json(response).await;
    let thread_id = thread["id"].as_str().expect("thread id").to_string();
    assert_eq!(thread["name"], "Practice");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/api/threads/{thread_id}"))
                .header(header::AUTHORIZATION, "Bearer user-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"archived": true}"#))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert!(!updated["archived_at"].is_null());

    // A stranger sees someone else's thread as missing.
    create_user(&app.state, "user-2", SubscriptionTier::Free);
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/threads/{thread_id}"))
                .header(header::AUTHORIZATION, "Bearer user-2")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/threads/{thread_id}"))
                .header(header::AUTHORIZATION, "Bearer user-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn broke_account_gets_payment_required_before_any_work() {
    let app = app_with_defaults();
    create_user(&app.state, "user-1", SubscriptionTier::Free);
    create_thread(&app.state, "t-1", "user-1");
    {
        let conn = app.state.pool.get().expect("conn");
        lingua_credits::deduct(&conn, "user-1", 20, None, "drain").expect("drain");
    }

    let boundary = "test-boundary";
    let body = multipart_audio_body(boundary, b"opus");
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/threads/t-1/turns")
                .header(header::AUTHORIZATION, "Bearer user-1")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "INSUFFICIENT_CREDITS");

    // Nothing was stored or persisted.
    let conn = app.state.pool.get().expect("conn");
    let messages = lingua_threads::list_messages(&conn, "t-1").expect("messages");
    assert!(messages.is_empty());
}

#[tokio::test]
async fn turn_over_http_returns_both_messages() {
    let app = app_with_defaults();
    create_user(&app.state, "user-1", SubscriptionTier::Free);
    create_thread(&app.state, "t-1", "user-1");

    let boundary = "test-boundary";
    let body = multipart_audio_body(boundary, b"opus");
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/threads/t-1/turns")
                .header(header::AUTHORIZATION, "Bearer user-1")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user_message"]["content"], "hello");
    assert_eq!(json["assistant_message"]["content"], "reply");
}

#[tokio::test]
async fn media_route_serves_only_valid_signatures() {
    let app = app_with_defaults();
    app.state
        .store
        .put("user/t-1/m-1.webm", b"clip", "audio/webm")
        .await
        .expect("put");

    let url = app
        .state
        .store
        .signed_url(
            "user/t-1/m-1.webm",
            Duration::from_secs(60),
            Audience::External,
        )
        .expect("sign");
    let path_and_query = url.strip_prefix("http://public.test").expect("base");

    let router = lingua_server::app((*app.state).clone());
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(path_and_query)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("audio/webm")
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"clip");

    // Flip the signature and the same key turns invisible.
    let tampered = path_and_query.replace("sig=", "sig=00");
    let response = router
        .oneshot(
            Request::builder()
                .uri(tampered)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_and_credits_endpoints_return_user_scoped_data() {
    let app = app_with_defaults();
    create_user(&app.state, "user-1", SubscriptionTier::Pro);
    let router = lingua_server::app((*app.state).clone());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/credits")
                .header(header::AUTHORIZATION, "Bearer user-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["balance"], 1200);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/stats/phonemes")
                .header(header::AUTHORIZATION, "Bearer user-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total_attempts"], 0);
    assert!(json["phonemes"].as_array().expect("array").is_empty());
}
