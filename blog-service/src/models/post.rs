//! The single document type stored by the blog assistant.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A blog post and the facts it was written from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub subject: String,

    /// Newline-delimited facts.
    #[serde(default)]
    pub facts: String,

    #[serde(default)]
    pub style: String,

    /// Comma-separated. Missing on some older documents.
    #[serde(default)]
    pub tags: String,

    /// Comma-separated. Missing on some older documents.
    #[serde(default)]
    pub categories: String,

    #[serde(default)]
    pub post_date: String,

    /// Markdown body.
    #[serde(default)]
    pub post: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fact_embedding: Vec<f32>,

    /// Similarity score, only set on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Post {
    pub fn id_hex(&self) -> Option<String> {
        self.id.map(|id| id.to_hex())
    }

    /// Non-empty fact lines, in order.
    pub fn fact_items(&self) -> Vec<&str> {
        self.facts
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .collect()
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_list(&self.tags)
    }

    pub fn category_list(&self) -> Vec<String> {
        split_list(&self.categories)
    }
}

/// Split a comma-separated field, trimming items and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
