//! Hugo export: one markdown file per post with TOML front matter.

use crate::models::Post;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::path::Path;

const FRONT_MATTER_DELIMITER: &str = "+++";

/// Longest file stem written, in bytes. Filesystems cap names at 255.
const MAX_STEM_BYTES: usize = 200;

/// Front matter fields written ahead of each post body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub title: String,
    pub date: String,
    pub draft: bool,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

impl From<&Post> for FrontMatter {
    fn from(post: &Post) -> Self {
        Self {
            title: post.subject.clone(),
            date: post.post_date.clone(),
            draft: false,
            tags: post.tag_list(),
            categories: post.category_list(),
        }
    }
}

/// Render the complete markdown document for a post.
pub fn render_markdown(post: &Post) -> Result<String, AppError> {
    let front_matter = toml::to_string(&FrontMatter::from(post)).map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Failed to serialize front matter: {}", e))
    })?;

    let mut document = String::with_capacity(post.post.len() + front_matter.len() + 128);
    document.push_str(FRONT_MATTER_DELIMITER);
    document.push('\n');
    document.push_str(&front_matter);
    document.push_str(FRONT_MATTER_DELIMITER);
    document.push_str("\n\n");
    document.push_str(&post.post);
    document.push_str("\n### Facts Used:\n");
    for fact in post.fact_items() {
        document.push_str("* ");
        document.push_str(fact);
        document.push('\n');
    }
    Ok(document)
}

/// Split a rendered document back into its front matter and body.
pub fn parse_front_matter(document: &str) -> Result<(FrontMatter, &str), AppError> {
    let invalid = |reason: &str| {
        AppError::BadRequest(anyhow::anyhow!("Invalid front matter: {}", reason))
    };

    let rest = document
        .strip_prefix("+++\n")
        .ok_or_else(|| invalid("missing opening delimiter"))?;
    let end = rest
        .find("\n+++\n")
        .ok_or_else(|| invalid("missing closing delimiter"))?;

    let front_matter: FrontMatter =
        toml::from_str(&rest[..end]).map_err(|e| invalid(&e.to_string()))?;
    let body = rest[end + "\n+++\n".len()..].trim_start_matches('\n');
    Ok((front_matter, body))
}

/// File name for a post: the subject with path separators neutralised.
pub fn file_name(post: &Post) -> String {
    let stem: String = post
        .subject
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            other => other,
        })
        .collect();

    let stem = truncate_to_boundary(&stem, MAX_STEM_BYTES).trim_end();
    let stem = match stem {
        "" | "." | ".." => post.id_hex().unwrap_or_else(|| "untitled".to_string()),
        _ => stem.to_string(),
    };
    format!("{}.md", stem)
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Write every post into `content_dir`, creating it if needed.
/// Returns the number of files written.
pub async fn export_posts(posts: &[Post], content_dir: &Path) -> Result<usize, AppError> {
    tokio::fs::create_dir_all(content_dir).await.map_err(|e| {
        tracing::error!(path = %content_dir.display(), "Failed to create content directory: {}", e);
        AppError::from(e)
    })?;

    let mut written = 0usize;
    for post in posts {
        let path = content_dir.join(file_name(post));
        let document = render_markdown(post)?;
        tokio::fs::write(&path, document).await.map_err(|e| {
            tracing::error!(path = %path.display(), "Failed to write post: {}", e);
            AppError::from(e)
        })?;
        written += 1;
    }

    metrics::counter!("blog_posts_exported_total").increment(written as u64);
    tracing::info!(
        count = written,
        path = %content_dir.display(),
        "Exported posts"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post {
            subject: "Walking in \"Kyoto\"".to_string(),
            facts: "Temples everywhere\n\nIt's humid in June\n".to_string(),
            style: "travelogue".to_string(),
            tags: "travel, japan".to_string(),
            categories: "Trips".to_string(),
            post_date: "2024-06-12".to_string(),
            post: "Kyoto was lovely.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn front_matter_round_trips_from_post() {
        let post = post();
        let document = render_markdown(&post).unwrap();
        let (front_matter, body) = parse_front_matter(&document).unwrap();

        assert_eq!(front_matter.title, post.subject);
        assert_eq!(front_matter.date, post.post_date);
        assert!(!front_matter.draft);
        assert_eq!(front_matter.tags, vec!["travel", "japan"]);
        assert_eq!(front_matter.categories, vec!["Trips"]);
        assert_eq!(front_matter.tags.join(","), "travel,japan");
        assert!(body.starts_with("Kyoto was lovely.\n"));
    }

    #[test]
    fn facts_are_listed_after_body() {
        let document = render_markdown(&post()).unwrap();
        assert!(document.ends_with(
            "Kyoto was lovely.\n### Facts Used:\n* Temples everywhere\n* It's humid in June\n"
        ));
    }

    #[test]
    fn file_name_cannot_escape_directory() {
        let mut post = post();
        post.subject = "../etc/passwd".to_string();
        assert_eq!(file_name(&post), "..-etc-passwd.md");

        post.subject = "  ".to_string();
        assert_eq!(file_name(&post), "untitled.md");
    }

    #[test]
    fn long_subject_is_cut_on_char_boundary() {
        let mut post = post();
        post.subject = "é".repeat(150);
        let name = file_name(&post);
        let stem = name.strip_suffix(".md").unwrap();
        assert!(stem.len() <= MAX_STEM_BYTES);
        assert_eq!(stem, "é".repeat(100));
    }

    #[tokio::test]
    async fn long_subject_does_not_abort_export() {
        let dir = tempfile::tempdir().unwrap();

        let mut long = post();
        long.subject = "x".repeat(300);
        let mut fine = post();
        fine.subject = "Fine".to_string();

        let written = export_posts(&[long, fine], dir.path()).await.unwrap();

        assert_eq!(written, 2);
        assert!(dir.path().join(format!("{}.md", "x".repeat(200))).exists());
        assert!(dir.path().join("Fine.md").exists());
    }

    #[test]
    fn missing_delimiter_is_rejected() {
        assert!(parse_front_matter("title = 'x'\n").is_err());
    }

    #[tokio::test]
    async fn export_writes_one_file_per_post() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content").join("posts");

        let mut second = post();
        second.subject = "Second".to_string();

        let written = export_posts(&[post(), second], &content).await.unwrap();
        assert_eq!(written, 2);

        let text = std::fs::read_to_string(content.join("Second.md")).unwrap();
        let (front_matter, _) = parse_front_matter(&text).unwrap();
        assert_eq!(front_matter.title, "Second");
    }
}
