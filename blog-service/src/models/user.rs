use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

/// Session key holding the logged-in username.
pub const SESSION_USER_KEY: &str = "user";

/// The username stored in the session, if any.
///
/// Extraction never redirects; route protection is the job of
/// [`crate::middleware::auth::require_login`].
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<String>);

impl CurrentUser {
    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }

    pub fn name(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to extract session",
                )
                    .into_response()
            })?;

        let user: Option<String> = session.get(SESSION_USER_KEY).await.unwrap_or(None);
        Ok(CurrentUser(user))
    }
}
