//! Router construction and server lifecycle.

use crate::config::{BlogConfig, StoreBackend};
use crate::handlers::{
    auth::{login_handler, login_page, logout_handler},
    delete::delete_post,
    export::generate_site,
    health::{health_check, readiness_check},
    index::{index_page, search_posts},
    metrics::metrics,
    post::{create_post, edit_post_page, new_post_page, update_post},
};
use crate::middleware::auth::require_login;
use crate::services::providers::build_provider;
use crate::services::{
    CsrfGuard, Embedder, HttpEmbedder, InMemoryPostRepository, MongoPostRepository,
    PostGenerator, PostRepository, SearchParams,
};
use crate::AppState;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

pub fn build_router(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    let protected = Router::new()
        .route("/", get(index_page).post(search_posts))
        .route("/post", get(new_post_page).post(create_post))
        .route("/post/:id", get(edit_post_page).post(update_post))
        .route("/delete/:id", get(delete_post))
        .route("/generate", get(generate_site))
        .route_layer(from_fn_with_state(state.clone(), require_login));

    Router::new()
        .merge(protected)
        .route("/login", get(login_page).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .layer(session_layer)
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn open_repository(config: &BlogConfig) -> Result<Arc<dyn PostRepository>, AppError> {
    match config.store {
        StoreBackend::Mongo => {
            let repo = MongoPostRepository::connect(&config.mongodb.uri, &config.mongodb.database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;

            repo.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(repo))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory post store; posts are lost on restart");
            Ok(Arc::new(InMemoryPostRepository::new()))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: BlogConfig) -> Result<Self, AppError> {
        let posts = open_repository(&config).await?;

        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(config.embedder.clone())?);
        tracing::info!(
            endpoint = %config.embedder.embedding_endpoint,
            "Initialized embedding client"
        );

        let provider = build_provider(&config.model)?;
        let generator = PostGenerator::new(provider, &config.defaults)
            .with_temperature(config.model.temperature);

        let state = AppState {
            posts,
            embedder,
            generator,
            csrf: CsrfGuard::new(config.secret_key.clone()),
            users: Arc::new(config.users.clone()),
            defaults: Arc::new(config.defaults.clone()),
            content_path: Arc::new(config.content_path.clone()),
            search: SearchParams::default(),
        };

        if !state.auth_enabled() {
            tracing::warn!("USERS is null; login is disabled");
        }

        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Port actually bound; differs from the configured one when that was 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let local: SocketAddr = self.listener.local_addr()?;
        tracing::info!("Starting blog-service on {}", local);

        let app = build_router(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
