use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a helpful assistant that writes engaging, accurate blog posts in markdown.";

const DEFAULT_PROMPT_TEMPLATE: &str = "Write a blog post about {subject} in a {style} style. \
Use only the following facts, one per line:\n{facts}";

const DEFAULT_EMBEDDING_INSTRUCTION: &str = "Represent this text for retrieval:";

/// Username to password map. `None` disables login entirely.
pub type Users = Option<HashMap<String, String>>;

#[derive(Clone)]
pub struct BlogConfig {
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub store: StoreBackend,
    pub secret_key: Secret<String>,
    pub content_path: PathBuf,
    pub defaults: PostDefaults,
    pub users: Users,
    pub model: ModelConfig,
    pub embedder: EmbedderConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown BLOG_STORE '{}', expected 'mongo' or 'memory'",
                other
            ))),
        }
    }
}

/// Prompting defaults and the values pre-filled into a new post form.
#[derive(Debug, Clone)]
pub struct PostDefaults {
    pub system: String,
    pub prompt: String,
    pub style: String,
    pub tags: String,
    pub category: String,
}

/// Which generation backend a deployment talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

/// Contents of `model.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.7
}

/// Contents of `embedder.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderConfig {
    pub embedding_endpoint: String,
    #[serde(default = "default_instruction")]
    pub instruction: String,
}

fn default_instruction() -> String {
    DEFAULT_EMBEDDING_INSTRUCTION.to_string()
}

impl BlogConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let model_path = get_env("MODEL_CONFIG", Some("model.json"), is_prod)?;
        let embedder_path = get_env("EMBEDDER_CONFIG", Some("embedder.json"), is_prod)?;

        Ok(BlogConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGO_CON", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGO_DB", Some("blog"), is_prod)?,
            },
            store: get_env("BLOG_STORE", Some("mongo"), false)?.parse()?,
            secret_key: Secret::new(get_env("SECRET_KEY", None, is_prod)?),
            content_path: PathBuf::from(get_env("CONTENT", Some("content/posts"), is_prod)?),
            defaults: PostDefaults {
                system: get_env("DEFAULT_SYSTEM", Some(DEFAULT_SYSTEM_MESSAGE), is_prod)?,
                prompt: get_env("DEFAULT_PROMPT", Some(DEFAULT_PROMPT_TEMPLATE), is_prod)?,
                style: get_env("DEFAULT_STYLE", Some("informative"), is_prod)?,
                tags: get_env("DEFAULT_TAGS", Some("blog"), is_prod)?,
                category: get_env("DEFAULT_CATEGORY", Some("general"), is_prod)?,
            },
            users: parse_users(&get_env("USERS", None, is_prod)?)?,
            model: load_json_file(Path::new(&model_path))?,
            embedder: load_json_file(Path::new(&embedder_path))?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }
}

/// Parse the `USERS` variable: a JSON object of username to password, or `null`.
pub fn parse_users(raw: &str) -> Result<Users, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("USERS is not valid JSON: {}", e)))
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
