//! Shared setup for blog-service integration tests.
//!
//! Builds the router over the in-memory store, a static embedder and a
//! scripted text provider, and carries the session cookie between requests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use blog_service::config::{PostDefaults, Users};
use async_trait::async_trait;
use blog_service::services::embedder::{Embedder, StaticEmbedder};
use blog_service::services::providers::mock::MockTextProvider;
use blog_service::services::{CsrfGuard, InMemoryPostRepository, PostGenerator, SearchParams};
use blog_service::startup::build_router;
use blog_service::AppState;
use secrecy::Secret;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const TEST_USER: &str = "ada";
pub const TEST_PASSWORD: &str = "lovelace";

pub fn defaults() -> PostDefaults {
    PostDefaults {
        system: "You write blogs.".to_string(),
        prompt: "Write about {subject} in a {style} style using:\n{facts}".to_string(),
        style: "informative".to_string(),
        tags: "blog".to_string(),
        category: "general".to_string(),
    }
}

pub fn test_users() -> Users {
    Some(HashMap::from([(
        TEST_USER.to_string(),
        TEST_PASSWORD.to_string(),
    )]))
}

pub struct TestApp {
    pub router: Router,
    pub posts: Arc<InMemoryPostRepository>,
    pub provider: Arc<MockTextProvider>,
    pub content_dir: TempDir,
    cookie: Option<String>,
}

pub struct TestAppBuilder {
    users: Users,
    provider: MockTextProvider,
    embedder: Arc<dyn Embedder>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            users: test_users(),
            provider: MockTextProvider::new("A generated post."),
            embedder: Arc::new(StaticEmbedder::new(vec![1.0, 0.0])),
        }
    }

    pub fn users(mut self, users: Users) -> Self {
        self.users = users;
        self
    }

    pub fn provider(mut self, provider: MockTextProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn embedder(mut self, embedder: impl Embedder + 'static) -> Self {
        self.embedder = Arc::new(embedder);
        self
    }

    pub fn build(self) -> TestApp {
        let posts = Arc::new(InMemoryPostRepository::new());
        let provider = Arc::new(self.provider);
        let content_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let defaults = defaults();

        let generator = PostGenerator::new(provider.clone(), &defaults)
            .with_retry(RetryConfig::no_retry());

        let state = AppState {
            posts: posts.clone(),
            embedder: self.embedder,
            generator,
            csrf: CsrfGuard::new(Secret::new("test-secret".to_string())),
            users: Arc::new(self.users),
            defaults: Arc::new(defaults),
            content_path: Arc::new(content_dir.path().join("posts")),
            search: SearchParams::default(),
        };

        TestApp {
            router: build_router(state),
            posts,
            provider,
            content_dir,
            cookie: None,
        }
    }
}

impl TestApp {
    pub async fn request(&mut self, request: Request<Body>) -> Response {
        let mut request = request;
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().expect("Invalid cookie"));
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let value = set_cookie.to_str().expect("Invalid Set-Cookie header");
            if let Some(pair) = value.split(';').next() {
                self.cookie = Some(pair.to_string());
            }
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response {
        self.request(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(encode_form(fields)))
                .expect("Failed to build request"),
        )
        .await
    }

    /// Fetch `page` and pull the CSRF token out of its form.
    pub async fn csrf_token(&mut self, page: &str) -> String {
        let response = self.get(page).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {} failed", page);
        let html = body_text(response).await;
        extract_csrf_token(&html).expect("Page has no CSRF token")
    }

    pub async fn login(&mut self) {
        let token = self.csrf_token("/login").await;
        let response = self
            .post_form(
                "/login",
                &[
                    ("username", TEST_USER),
                    ("password", TEST_PASSWORD),
                    ("csrf_token", &token),
                ],
            )
            .await;
        assert_eq!(location(&response), Some("/"));
    }
}

/// Embedder whose upstream is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, AppError> {
        Err(AppError::BadGateway(
            "embedding service returned 503".to_string(),
        ))
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub fn extract_csrf_token(html: &str) -> Option<String> {
    let marker = "name=\"csrf_token\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

pub fn encode_form(fields: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(fields).expect("Failed to encode form")
}
