use crate::models::{forms::error_messages, user::SESSION_USER_KEY, LoginForm};
use crate::AppState;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use service_core::error::AppError;
use subtle::ConstantTimeEq;
use tower_sessions::Session;
use validator::Validate;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub logged_in: bool,
    pub username: String,
    pub csrf_token: String,
    pub errors: Vec<String>,
}

pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    Ok(LoginTemplate {
        logged_in: false,
        username: String::new(),
        csrf_token: state.csrf.issue(&session).await?,
        errors: Vec::new(),
    }
    .into_response())
}

/// Whether `username`/`password` match a configured user.
fn credentials_match(state: &AppState, username: &str, password: &str) -> bool {
    let Some(users) = state.users.as_ref() else {
        return false;
    };
    match users.get(username) {
        Some(expected) => bool::from(expected.as_bytes().ct_eq(password.as_bytes())),
        None => false,
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    state.csrf.verify(&session, &form.csrf_token).await?;

    let (status, errors) = match form.validate() {
        Err(errors) => (StatusCode::UNPROCESSABLE_ENTITY, error_messages(&errors)),
        Ok(()) if credentials_match(&state, &form.username, &form.password) => {
            session
                .cycle_id()
                .await
                .map_err(|e| AppError::SessionError(e.to_string()))?;
            session
                .insert(SESSION_USER_KEY, &form.username)
                .await
                .map_err(|e| AppError::SessionError(e.to_string()))?;

            tracing::info!(username = %form.username, "User logged in");
            return Ok(Redirect::to("/").into_response());
        }
        Ok(()) => {
            tracing::warn!(username = %form.username, "Rejected login attempt");
            (
                StatusCode::UNAUTHORIZED,
                vec!["Invalid username or password".to_string()],
            )
        }
    };

    let template = LoginTemplate {
        logged_in: false,
        username: String::new(),
        csrf_token: state.csrf.issue(&session).await?,
        errors,
    };
    Ok((status, template).into_response())
}

pub async fn logout_handler(session: Session) -> Result<Redirect, AppError> {
    let user: Option<String> = session
        .remove(SESSION_USER_KEY)
        .await
        .map_err(|e| AppError::SessionError(e.to_string()))?;

    if let Some(user) = user {
        tracing::info!(username = %user, "User logged out");
    }
    Ok(Redirect::to("/login"))
}
