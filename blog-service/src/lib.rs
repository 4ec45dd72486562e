pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use config::{PostDefaults, Users};
use services::{CsrfGuard, Embedder, PostGenerator, PostRepository, SearchParams};
use std::path::PathBuf;
use std::sync::Arc;

/// Number of posts shown on the landing page.
pub const RECENT_POSTS_LIMIT: i64 = 5;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: PostGenerator,
    pub csrf: CsrfGuard,
    pub users: Arc<Users>,
    pub defaults: Arc<PostDefaults>,
    pub content_path: Arc<PathBuf>,
    pub search: SearchParams,
}

impl AppState {
    /// Whether routes other than login/logout need a session user.
    pub fn auth_enabled(&self) -> bool {
        self.users.is_some()
    }
}
