pub mod csrf;
pub mod embedder;
pub mod export;
pub mod generation;
pub mod metrics;
pub mod providers;
pub mod repository;

pub use csrf::CsrfGuard;
pub use embedder::{Embedder, HttpEmbedder};
pub use generation::PostGenerator;
pub use repository::{InMemoryPostRepository, MongoPostRepository, PostRepository, SearchParams};
