//! Form payloads posted by the HTML pages.

use crate::models::Post;
use serde::Deserialize;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostForm {
    #[validate(length(min = 1, message = "Subject or topic is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "At least one fact is required"))]
    pub facts: String,
    #[validate(length(min = 1, message = "Post style is required"))]
    pub style: String,
    #[validate(length(min = 1, message = "Tags are required"))]
    pub tags: String,
    #[validate(length(min = 1, message = "Categories are required"))]
    pub categories: String,
    #[validate(length(min = 1, message = "Post date is required"))]
    pub post_date: String,
    /// Blank means "generate from the facts".
    #[serde(default)]
    pub post: String,
    #[serde(default)]
    pub csrf_token: String,
}

impl PostForm {
    /// Trim surrounding whitespace so blank-only input fails validation.
    pub fn normalized(mut self) -> Self {
        self.subject = self.subject.trim().to_string();
        self.facts = self.facts.trim().to_string();
        self.style = self.style.trim().to_string();
        self.tags = self.tags.trim().to_string();
        self.categories = self.categories.trim().to_string();
        self.post_date = self.post_date.trim().to_string();
        self
    }

    pub fn wants_generation(&self) -> bool {
        self.post.trim().is_empty()
    }

    /// Prefill from a stored post. Tags and categories keep the form's
    /// defaults when the stored document has none.
    pub fn fill_from(&mut self, post: &Post) {
        self.subject = post.subject.clone();
        self.facts = post.facts.clone();
        self.style = post.style.clone();
        self.post_date = post.post_date.clone();
        if !post.tags.is_empty() {
            self.tags = post.tags.clone();
        }
        if !post.categories.is_empty() {
            self.categories = post.categories.clone();
        }
        self.post = post.post.clone();
    }

    /// Build the document to store. The caller supplies the embedding and
    /// the final body.
    pub fn into_post(self, fact_embedding: Vec<f32>, body: String) -> Post {
        Post {
            id: None,
            subject: self.subject,
            facts: self.facts,
            style: self.style,
            tags: self.tags,
            categories: self.categories,
            post_date: self.post_date,
            post: body,
            fact_embedding,
            score: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SearchForm {
    #[validate(length(min = 1, message = "Search text is required"))]
    pub search: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub csrf_token: String,
}

/// Flatten validation errors into sorted, human readable messages.
pub fn error_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages
}
