use crate::models::user::SESSION_USER_KEY;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Send anonymous visitors to `/login`. A no-op when no users are configured.
pub async fn require_login(
    State(state): State<AppState>,
    session: Session,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.auth_enabled() {
        return next.run(request).await;
    }

    let user: Option<String> = session.get(SESSION_USER_KEY).await.unwrap_or(None);
    if user.is_none() {
        tracing::debug!(path = %request.uri().path(), "Redirecting anonymous request to login");
        return Redirect::to("/login").into_response();
    }

    next.run(request).await
}
