use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Redirect,
};
use service_core::error::AppError;

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    state.posts.delete(&id).await?;
    Ok(Redirect::to("/"))
}
