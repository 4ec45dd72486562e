use blog_service::config::BlogConfig;
use blog_service::services::metrics::init_metrics;
use blog_service::startup::Application;
use dotenvy::dotenv;
use service_core::observability::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = BlogConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("blog-service", "info", config.otlp_endpoint.as_deref());
    init_metrics();

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to start blog-service: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    application.run_until_stopped().await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
