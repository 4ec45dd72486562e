use crate::models::{forms::error_messages, CurrentUser, Post, SearchForm};
use crate::{AppState, RECENT_POSTS_LIMIT};
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use service_core::error::AppError;
use tower_sessions::Session;
use validator::Validate;

/// A post as shown in the list.
pub struct PostView {
    pub id: String,
    pub subject: String,
    pub post_date: String,
    pub style: String,
    pub facts: Vec<String>,
    pub post: String,
    /// Formatted similarity score; empty outside search results.
    pub score: String,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id_hex().unwrap_or_default(),
            facts: post.fact_items().into_iter().map(str::to_string).collect(),
            score: post.score.map(|s| format!("{:.3}", s)).unwrap_or_default(),
            subject: post.subject,
            post_date: post.post_date,
            style: post.style,
            post: post.post,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub logged_in: bool,
    pub username: String,
    pub csrf_token: String,
    pub search: String,
    pub searched: bool,
    pub errors: Vec<String>,
    pub posts: Vec<PostView>,
}

/// Landing page: the most recent posts.
pub async fn index_page(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let posts = state.posts.recent(RECENT_POSTS_LIMIT).await?;

    Ok(IndexTemplate {
        logged_in: user.is_logged_in(),
        username: user.name().to_string(),
        csrf_token: state.csrf.issue(&session).await?,
        search: String::new(),
        searched: false,
        errors: Vec::new(),
        posts: posts.into_iter().map(PostView::from).collect(),
    }
    .into_response())
}

/// Semantic search over post facts.
pub async fn search_posts(
    State(state): State<AppState>,
    session: Session,
    user: CurrentUser,
    Form(form): Form<SearchForm>,
) -> Result<Response, AppError> {
    state.csrf.verify(&session, &form.csrf_token).await?;

    let query = form.search.trim().to_string();
    let form = SearchForm {
        search: query.clone(),
        ..form
    };

    let mut template = IndexTemplate {
        logged_in: user.is_logged_in(),
        username: user.name().to_string(),
        csrf_token: state.csrf.issue(&session).await?,
        search: query.clone(),
        searched: false,
        errors: Vec::new(),
        posts: Vec::new(),
    };

    if let Err(errors) = form.validate() {
        template.errors = error_messages(&errors);
        template.posts = state
            .posts
            .recent(RECENT_POSTS_LIMIT)
            .await?
            .into_iter()
            .map(PostView::from)
            .collect();
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response());
    }

    let vector = state.embedder.embed(&query).await?;
    let results = state.posts.search(&vector, &state.search).await?;

    tracing::info!(query_len = query.len(), results = results.len(), "Searched posts");

    template.searched = true;
    template.posts = results.into_iter().map(PostView::from).collect();
    Ok(template.into_response())
}
