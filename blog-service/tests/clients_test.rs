//! Embedding and generation clients against local stub servers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use blog_service::config::EmbedderConfig;
use blog_service::services::embedder::{Embedder, HttpEmbedder};
use blog_service::services::providers::gemini::{GeminiConfig, GeminiProvider};
use blog_service::services::providers::openai::{OpenAiConfig, OpenAiProvider};
use blog_service::services::providers::{GenerationParams, ProviderError, TextProvider};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

type Captured = Arc<Mutex<Vec<Value>>>;

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", address)
}

fn params() -> GenerationParams {
    GenerationParams {
        temperature: Some(0.7),
        max_tokens: None,
    }
}

#[tokio::test]
async fn embedder_sends_text_and_instruction() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route(
            "/embed",
            get(
                |State(captured): State<Captured>,
                 Query(query): Query<HashMap<String, String>>| async move {
                    captured.lock().unwrap().push(json!(query));
                    Json(vec![0.25f32, 0.5, 0.25])
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_stub(router).await;

    let embedder = HttpEmbedder::new(EmbedderConfig {
        embedding_endpoint: format!("{}/embed", base),
        instruction: "Represent this:".to_string(),
    })
    .unwrap();

    let vector = embedder.embed("fresh bread & butter").await.unwrap();
    assert_eq!(vector, vec![0.25, 0.5, 0.25]);

    let requests = captured.lock().unwrap();
    assert_eq!(requests[0]["text"], "fresh bread & butter");
    assert_eq!(requests[0]["instruction"], "Represent this:");
}

#[tokio::test]
async fn embedder_maps_upstream_failure_to_bad_gateway() {
    let router = Router::new().route(
        "/embed",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn_stub(router).await;

    let embedder = HttpEmbedder::new(EmbedderConfig {
        embedding_endpoint: format!("{}/embed", base),
        instruction: "x".to_string(),
    })
    .unwrap();

    let err = embedder.embed("text").await.unwrap_err();
    assert!(matches!(
        err,
        service_core::error::AppError::BadGateway(_)
    ));
}

#[tokio::test]
async fn openai_provider_posts_chat_completion() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                |State(captured): State<Captured>, Json(body): Json<Value>| async move {
                    captured.lock().unwrap().push(body);
                    Json(json!({
                        "choices": [{
                            "message": {"role": "assistant", "content": "Drafted."},
                            "finish_reason": "stop"
                        }],
                        "usage": {"prompt_tokens": 12, "completion_tokens": 3}
                    }))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_stub(router).await;

    let provider = OpenAiProvider::new(OpenAiConfig {
        api_key: String::new(),
        base_url: format!("{}/v1/", base),
        model: "local-model".to_string(),
    })
    .unwrap();

    let response = provider
        .generate("Be brief.", "Write about tea", &params())
        .await
        .unwrap();
    assert_eq!(response.text, "Drafted.");
    assert_eq!(response.input_tokens, 12);
    assert_eq!(response.output_tokens, 3);

    let requests = captured.lock().unwrap();
    let body = &requests[0];
    assert_eq!(body["model"], "local-model");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "Be brief.");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Write about tea");
    assert!(body.get("max_tokens").is_none());
}

#[tokio::test]
async fn openai_rate_limit_is_reported() {
    let router = Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let base = spawn_stub(router).await;

    let provider = OpenAiProvider::new(OpenAiConfig {
        api_key: "key".to_string(),
        base_url: base,
        model: "m".to_string(),
    })
    .unwrap();

    let err = provider.generate("s", "p", &params()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited));
}

#[tokio::test]
async fn gemini_provider_sends_system_instruction() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route(
            "/v1beta/models/:method",
            post(
                |State(captured): State<Captured>,
                 Query(query): Query<HashMap<String, String>>,
                 Json(body): Json<Value>| async move {
                    captured
                        .lock()
                        .unwrap()
                        .push(json!({"key": query.get("key"), "body": body}));
                    Json(json!({
                        "candidates": [{
                            "content": {"role": "model", "parts": [{"text": "Gemini "}, {"text": "draft."}]},
                            "finishReason": "STOP"
                        }],
                        "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 2}
                    }))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_stub(router).await;

    let provider = GeminiProvider::new(GeminiConfig {
        api_key: "secret-key".to_string(),
        base_url: format!("{}/v1beta", base),
        model: "gemini-test".to_string(),
    })
    .unwrap();

    let response = provider
        .generate("Be brief.", "Write about tea", &params())
        .await
        .unwrap();
    assert_eq!(response.text, "Gemini draft.");
    assert_eq!(response.input_tokens, 8);

    let requests = captured.lock().unwrap();
    assert_eq!(requests[0]["key"], "secret-key");
    let body = &requests[0]["body"];
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Write about tea");
}

#[tokio::test]
async fn gemini_safety_stop_is_content_filtered() {
    let router = Router::new().route(
        "/models/:method",
        post(|| async {
            Json(json!({
                "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
            }))
        }),
    );
    let base = spawn_stub(router).await;

    let provider = GeminiProvider::new(GeminiConfig {
        api_key: "k".to_string(),
        base_url: base,
        model: "gemini-test".to_string(),
    })
    .unwrap();

    let err = provider.generate("s", "p", &params()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ContentFiltered));
}

#[test]
fn gemini_requires_api_key() {
    let result = GeminiProvider::new(GeminiConfig {
        api_key: String::new(),
        base_url: String::new(),
        model: "m".to_string(),
    });
    assert!(result.is_err());
}
