pub mod auth;
pub mod delete;
pub mod export;
pub mod health;
pub mod index;
pub mod metrics;
pub mod post;
