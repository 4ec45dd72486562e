use crate::models::{forms::error_messages, CurrentUser, PostForm};
use crate::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub logged_in: bool,
    pub username: String,
    pub csrf_token: String,
    /// Where the form posts back to.
    pub action: String,
    pub editing: bool,
    pub errors: Vec<String>,
    pub form: PostForm,
}

fn action_for(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("/post/{}", id),
        None => "/post".to_string(),
    }
}

/// A form pre-filled with the configured defaults and today's date.
fn default_form(state: &AppState) -> PostForm {
    PostForm {
        style: state.defaults.style.clone(),
        tags: state.defaults.tags.clone(),
        categories: state.defaults.category.clone(),
        post_date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        ..Default::default()
    }
}

async fn render_form(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    id: Option<&str>,
    form: PostForm,
    errors: Vec<String>,
) -> Result<PostTemplate, AppError> {
    Ok(PostTemplate {
        logged_in: user.is_logged_in(),
        username: user.name().to_string(),
        csrf_token: state.csrf.issue(session).await?,
        action: action_for(id),
        editing: id.is_some(),
        errors,
        form,
    })
}

pub async fn new_post_page(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let form = default_form(&state);
    Ok(render_form(&state, &session, &user, None, form, Vec::new())
        .await?
        .into_response())
}

pub async fn edit_post_page(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let post = state.posts.get(&id).await?;
    let mut form = default_form(&state);
    form.fill_from(&post);

    Ok(render_form(&state, &session, &user, Some(&id), form, Vec::new())
        .await?
        .into_response())
}

pub async fn create_post(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    save_post(state, session, user, None, form).await
}

pub async fn update_post(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    save_post(state, session, user, Some(id), form).await
}

/// Embed the facts, draft the body if it was left blank, then insert or
/// replace the stored post.
async fn save_post(
    state: AppState,
    session: Session,
    user: CurrentUser,
    id: Option<String>,
    form: PostForm,
) -> Result<Response, AppError> {
    state.csrf.verify(&session, &form.csrf_token).await?;

    // Unknown ids are rejected before embedding and generation.
    if let Some(id) = id.as_deref() {
        state.posts.get(id).await?;
    }

    let form = form.normalized();
    if let Err(errors) = form.validate() {
        let template = render_form(
            &state,
            &session,
            &user,
            id.as_deref(),
            form,
            error_messages(&errors),
        )
        .await?;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response());
    }

    let fact_embedding = state.embedder.embed(&form.facts).await?;

    let body = if form.wants_generation() {
        state
            .generator
            .draft(&form.subject, &form.facts, &form.style)
            .await
    } else {
        form.post.clone()
    };

    let post = form.into_post(fact_embedding, body);
    match id {
        Some(id) => state.posts.replace(&id, post).await?,
        None => {
            state.posts.insert(post).await?;
        }
    }

    Ok(Redirect::to("/").into_response())
}
