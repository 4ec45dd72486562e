use crate::services::export::export_posts;
use crate::AppState;
use axum::{extract::State, response::Redirect};
use service_core::error::AppError;

/// Write every post to the static site's content directory.
pub async fn generate_site(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let posts = state.posts.all().await?;
    export_posts(&posts, &state.content_path).await?;
    Ok(Redirect::to("/"))
}
