//! Vector store abstraction for Kurs.
//!
//! A store holds two collections: the course **catalog** (one entry per
//! course, used to resolve fuzzy course names) and course **content** (one
//! entry per chunk). Backends store pre-computed embeddings; [`CourseIndex`]
//! layers embedding and filter semantics on top.

mod index;
mod memory;
mod sqlite;

pub use index::{CourseIndex, SearchError, SearchHit, SearchResults};
pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::Result;
use crate::models::{Course, CourseChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry for one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub course: Course,
    /// Text the embedding was computed from.
    pub summary: String,
    pub embedding: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(course: Course, embedding: Vec<f32>) -> Self {
        Self {
            summary: course.catalog_summary(),
            course,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// Content entry for one chunk. Keyed by [`CourseChunk::id`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    pub chunk: CourseChunk,
    pub embedding: Vec<f32>,
}

/// Exact-match filters applied while scanning the content collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentFilter {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

impl ContentFilter {
    pub fn matches(&self, chunk: &CourseChunk) -> bool {
        self.course_title
            .as_ref()
            .map_or(true, |title| &chunk.course_title == title)
            && self
                .lesson_number
                .map_or(true, |n| chunk.lesson_number == Some(n))
    }
}

/// A content search hit with score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: CourseChunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// A catalog search hit with score.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    pub title: String,
    pub score: f32,
}

/// Summary information about an indexed course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedCourse {
    pub course: Course,
    pub chunk_count: u32,
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the catalog entry for a course (keyed by title).
    async fn upsert_course(&self, entry: &CatalogEntry) -> Result<()>;

    /// Insert or replace content entries (keyed by chunk id).
    async fn upsert_chunks(&self, entries: &[ContentEntry]) -> Result<usize>;

    /// Most similar catalog entries, best first.
    async fn search_catalog(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>>;

    /// Most similar content entries passing the filter, best first.
    async fn search_content(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Get a course by exact title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// List all catalog entries with their chunk counts, ordered by title.
    async fn list_courses(&self) -> Result<Vec<IndexedCourse>>;

    /// Get all chunks for a course, ordered by chunk index.
    async fn get_chunks(&self, course_title: &str) -> Result<Vec<CourseChunk>>;

    /// Remove a course and its content. Returns the number of chunks removed.
    async fn delete_course(&self, title: &str) -> Result<usize>;

    /// Number of catalog entries.
    async fn course_count(&self) -> Result<usize>;

    /// Number of content entries.
    async fn chunk_count(&self) -> Result<usize>;

    /// Remove everything from both collections.
    async fn clear(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort by descending score and keep the first `limit`.
pub(crate) fn rank<T>(mut items: Vec<T>, score: impl Fn(&T) -> f32, limit: usize) -> Vec<T> {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    items.truncate(limit);
    items
}
