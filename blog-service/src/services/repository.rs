//! Post storage.
//!
//! [`MongoPostRepository`] is the production store and delegates similarity
//! search to an Atlas `$vectorSearch` index. [`InMemoryPostRepository`]
//! implements the same contract for tests and local runs without Atlas.

use crate::models::Post;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use tokio::sync::RwLock;

pub const POSTS_COLLECTION: &str = "posts";

/// Name of the Atlas vector index over `fact_embedding`.
pub const VECTOR_INDEX: &str = "default";

/// Knobs for the nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Candidate pool considered by the index.
    pub num_candidates: u32,
    /// Maximum results returned.
    pub limit: u32,
    /// Results scoring below this are dropped.
    pub min_score: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            num_candidates: 100,
            limit: 5,
            min_score: 0.89,
        }
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Newest posts by `post_date`, without embeddings.
    async fn recent(&self, limit: i64) -> Result<Vec<Post>, AppError>;

    async fn all(&self) -> Result<Vec<Post>, AppError>;

    async fn get(&self, id: &str) -> Result<Post, AppError>;

    /// Store a new post and return its id.
    async fn insert(&self, post: Post) -> Result<String, AppError>;

    /// Replace the stored post wholesale.
    async fn replace(&self, id: &str, post: Post) -> Result<(), AppError>;

    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> Result<(), AppError>;

    /// Posts whose fact embedding is close to `vector`, best first.
    async fn search(&self, vector: &[f32], params: &SearchParams) -> Result<Vec<Post>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

pub fn parse_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id)
        .map_err(|_| AppError::NotFound(anyhow::anyhow!("No post with id '{}'", id)))
}

/// Atlas aggregation: vector search, projection with score, score cutoff.
pub fn vector_search_pipeline(vector: &[f32], params: &SearchParams) -> Vec<Document> {
    vec![
        doc! {
            "$vectorSearch": {
                "index": VECTOR_INDEX,
                "path": "fact_embedding",
                "queryVector": vector.to_vec(),
                "numCandidates": params.num_candidates as i64,
                "limit": params.limit as i64,
            }
        },
        doc! {
            "$project": {
                "subject": 1,
                "facts": 1,
                "style": 1,
                "post": 1,
                "post_date": 1,
                "tags": 1,
                "categories": 1,
                "score": { "$meta": "vectorSearchScore" },
            }
        },
        doc! {
            "$match": {
                "score": { "$gte": params.min_score }
            }
        },
    ]
}

#[derive(Clone)]
pub struct MongoPostRepository {
    client: MongoClient,
    db: Database,
}

impl MongoPostRepository {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    /// The vector index itself is an Atlas search index and is managed in
    /// Atlas, not here.
    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        let post_date_index = IndexModel::builder()
            .keys(doc! { "post_date": -1 })
            .options(
                IndexOptions::builder()
                    .name("post_date_idx".to_string())
                    .build(),
            )
            .build();

        self.posts()
            .create_index(post_date_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create post_date index: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created MongoDB indexes");
        Ok(())
    }

    fn posts(&self) -> Collection<Post> {
        self.db.collection(POSTS_COLLECTION)
    }
}

#[async_trait]
impl PostRepository for MongoPostRepository {
    async fn recent(&self, limit: i64) -> Result<Vec<Post>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "post_date": -1 })
            .limit(limit)
            .projection(doc! { "fact_embedding": 0 })
            .build();

        let posts = self
            .posts()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(posts)
    }

    async fn all(&self) -> Result<Vec<Post>, AppError> {
        let options = FindOptions::builder()
            .projection(doc! { "fact_embedding": 0 })
            .build();

        let posts = self
            .posts()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(posts)
    }

    async fn get(&self, id: &str) -> Result<Post, AppError> {
        let oid = parse_id(id)?;
        self.posts()
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No post with id '{}'", id)))
    }

    async fn insert(&self, mut post: Post) -> Result<String, AppError> {
        post.id = None;
        post.score = None;

        let result = self.posts().insert_one(&post, None).await?;
        let id = result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("Inserted id is not an ObjectId"))
            })?;

        tracing::info!(post_id = %id, subject = %post.subject, "Inserted post");
        Ok(id)
    }

    async fn replace(&self, id: &str, mut post: Post) -> Result<(), AppError> {
        let oid = parse_id(id)?;
        post.id = None;
        post.score = None;

        let result = self
            .posts()
            .replace_one(doc! { "_id": oid }, &post, None)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "No post with id '{}'",
                id
            )));
        }

        tracing::info!(post_id = %id, subject = %post.subject, "Replaced post");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let oid = parse_id(id)?;
        let result = self.posts().delete_one(doc! { "_id": oid }, None).await?;
        tracing::info!(post_id = %id, deleted = result.deleted_count, "Deleted post");
        Ok(())
    }

    async fn search(&self, vector: &[f32], params: &SearchParams) -> Result<Vec<Post>, AppError> {
        let documents: Vec<Document> = self
            .posts()
            .aggregate(vector_search_pipeline(vector, params), None)
            .await?
            .try_collect()
            .await?;

        documents
            .into_iter()
            .map(|document| {
                bson::from_document::<Post>(document).map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Malformed search result: {}",
                        e
                    ))
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }
}

/// Process-local store with the same search semantics as the Atlas index.
#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: RwLock<Vec<Post>>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }

    fn not_found(id: &str) -> AppError {
        AppError::NotFound(anyhow::anyhow!("No post with id '{}'", id))
    }
}

fn without_embedding(post: &Post) -> Post {
    Post {
        fact_embedding: Vec::new(),
        ..post.clone()
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn recent(&self, limit: i64) -> Result<Vec<Post>, AppError> {
        let mut posts: Vec<Post> = self.posts.read().await.iter().map(without_embedding).collect();
        posts.sort_by(|a, b| b.post_date.cmp(&a.post_date));
        posts.truncate(limit.max(0) as usize);
        Ok(posts)
    }

    async fn all(&self) -> Result<Vec<Post>, AppError> {
        Ok(self.posts.read().await.iter().map(without_embedding).collect())
    }

    async fn get(&self, id: &str) -> Result<Post, AppError> {
        let oid = parse_id(id)?;
        self.posts
            .read()
            .await
            .iter()
            .find(|post| post.id == Some(oid))
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn insert(&self, mut post: Post) -> Result<String, AppError> {
        let oid = ObjectId::new();
        post.id = Some(oid);
        post.score = None;
        self.posts.write().await.push(post);
        Ok(oid.to_hex())
    }

    async fn replace(&self, id: &str, mut post: Post) -> Result<(), AppError> {
        let oid = parse_id(id)?;
        let mut posts = self.posts.write().await;
        let slot = posts
            .iter_mut()
            .find(|existing| existing.id == Some(oid))
            .ok_or_else(|| Self::not_found(id))?;
        post.id = Some(oid);
        post.score = None;
        *slot = post;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let oid = parse_id(id)?;
        self.posts.write().await.retain(|post| post.id != Some(oid));
        Ok(())
    }

    async fn search(&self, vector: &[f32], params: &SearchParams) -> Result<Vec<Post>, AppError> {
        let posts = self.posts.read().await;
        let mut scored: Vec<Post> = posts
            .iter()
            .filter(|post| !post.fact_embedding.is_empty())
            .map(|post| Post {
                score: Some(vector_search_score(vector, &post.fact_embedding)),
                ..without_embedding(post)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .unwrap_or_default()
                .total_cmp(&a.score.unwrap_or_default())
        });
        scored.truncate(params.num_candidates.min(params.limit) as usize);
        scored.retain(|post| post.score.unwrap_or_default() >= params.min_score);
        Ok(scored)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Cosine similarity normalised to `[0, 1]` the way Atlas reports
/// `vectorSearchScore` for cosine indexes.
pub fn vector_search_score(a: &[f32], b: &[f32]) -> f64 {
    (1.0 + cosine_similarity(a, b)) / 2.0
}

/// Zero for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(subject: &str, date: &str, embedding: Vec<f32>) -> Post {
        Post {
            subject: subject.to_string(),
            facts: format!("{} fact", subject),
            style: "plain".to_string(),
            post_date: date.to_string(),
            post: format!("{} body", subject),
            fact_embedding: embedding,
            ..Default::default()
        }
    }

    #[test]
    fn pipeline_ends_with_score_cutoff() {
        let params = SearchParams::default();
        let pipeline = vector_search_pipeline(&[0.1, 0.2], &params);
        assert_eq!(pipeline.len(), 3);

        let search = pipeline[0].get_document("$vectorSearch").unwrap();
        assert_eq!(search.get_str("index").unwrap(), "default");
        assert_eq!(search.get_str("path").unwrap(), "fact_embedding");
        assert_eq!(search.get_i64("numCandidates").unwrap(), 100);
        assert_eq!(search.get_i64("limit").unwrap(), 5);
        assert_eq!(search.get_array("queryVector").unwrap().len(), 2);

        let project = pipeline[1].get_document("$project").unwrap();
        assert_eq!(
            project.get_document("score").unwrap(),
            &doc! { "$meta": "vectorSearchScore" }
        );

        let cutoff = pipeline[2]
            .get_document("$match")
            .unwrap()
            .get_document("score")
            .unwrap();
        assert_eq!(cutoff.get_f64("$gte").unwrap(), 0.89);
    }

    #[test]
    fn cosine_edges() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert!((vector_search_score(&[1.0, 0.0], &[-1.0, 0.0])).abs() < 1e-9);
    }

    #[tokio::test]
    async fn search_drops_results_below_cutoff() {
        let repo = InMemoryPostRepository::new();
        repo.insert(post("exact", "2024-01-01", vec![1.0, 0.0])).await.unwrap();
        repo.insert(post("close", "2024-01-02", vec![0.9, 0.1])).await.unwrap();
        repo.insert(post("far", "2024-01-03", vec![0.0, 1.0])).await.unwrap();

        let results = repo
            .search(&[1.0, 0.0], &SearchParams::default())
            .await
            .unwrap();

        let subjects: Vec<&str> = results.iter().map(|p| p.subject.as_str()).collect();
        assert_eq!(subjects, vec!["exact", "close"]);
        assert!(results.iter().all(|p| p.score.unwrap() >= 0.89));
        assert!(results.iter().all(|p| p.fact_embedding.is_empty()));
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let repo = InMemoryPostRepository::new();
        for i in 0..8 {
            repo.insert(post(&format!("p{}", i), "2024-01-01", vec![1.0, 0.01 * i as f32]))
                .await
                .unwrap();
        }

        let params = SearchParams {
            limit: 3,
            ..Default::default()
        };
        let results = repo.search(&[1.0, 0.0], &params).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].subject, "p0");
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let repo = InMemoryPostRepository::new();
        for date in ["2024-01-03", "2024-02-01", "2023-12-31", "2024-01-15"] {
            repo.insert(post(date, date, vec![1.0])).await.unwrap();
        }

        let recent = repo.recent(3).await.unwrap();
        let dates: Vec<&str> = recent.iter().map(|p| p.post_date.as_str()).collect();
        assert_eq!(dates, vec!["2024-02-01", "2024-01-15", "2024-01-03"]);
    }

    #[tokio::test]
    async fn replace_is_wholesale_and_keeps_id() {
        let repo = InMemoryPostRepository::new();
        let id = repo.insert(post("before", "2024-01-01", vec![1.0])).await.unwrap();

        repo.replace(&id, post("after", "2024-02-02", vec![0.5]))
            .await
            .unwrap();

        let stored = repo.get(&id).await.unwrap();
        assert_eq!(stored.subject, "after");
        assert_eq!(stored.fact_embedding, vec![0.5]);
        assert_eq!(stored.id_hex().as_deref(), Some(id.as_str()));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids() {
        let repo = InMemoryPostRepository::new();
        assert!(matches!(repo.get("not-an-id").await, Err(AppError::NotFound(_))));

        let missing = ObjectId::new().to_hex();
        assert!(matches!(repo.get(&missing).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            repo.replace(&missing, Post::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.delete(&missing).await.is_ok());
    }
}
