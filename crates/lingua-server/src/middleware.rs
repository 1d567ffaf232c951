use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use rusqlite::OptionalExtension;
use std::sync::Arc;

use crate::AppState;

/// The authenticated user, stored in request extensions.
///
/// Authentication is `Authorization: Bearer <user_id>` — the token is the
/// user's opaque ID, verified against the users table. Session tokens are
/// an upstream gateway's concern in this deployment.
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: String,
    pub display_name: String,
}

/// Middleware that resolves the bearer token to a user row.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "))
        .map(|token| token.to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    // Any lookup failure, including "not found", is Unauthorized.
    let user = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        conn.query_row(
            "SELECT id, display_name FROM users WHERE id = ?1",
            [&token],
            |row| {
                Ok(UserContext {
                    user_id: row.get(0)?,
                    display_name: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .ok_or(StatusCode::UNAUTHORIZED)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
