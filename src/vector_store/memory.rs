//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_similarity, rank, CatalogEntry, CatalogMatch, ContentEntry, ContentFilter,
    IndexedCourse, ScoredChunk, VectorStore,
};
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    catalog: RwLock<HashMap<String, CatalogEntry>>,
    /// Keyed by (course title, chunk index).
    content: RwLock<HashMap<(String, u32), ContentEntry>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(HashMap::new()),
            content: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_course(&self, entry: &CatalogEntry) -> Result<()> {
        let mut catalog = write(&self.catalog)?;
        catalog.insert(entry.course.title.clone(), entry.clone());
        Ok(())
    }

    async fn upsert_chunks(&self, entries: &[ContentEntry]) -> Result<usize> {
        let mut content = write(&self.content)?;
        for entry in entries {
            content.insert(entry.chunk.key(), entry.clone());
        }
        Ok(entries.len())
    }

    async fn search_catalog(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let catalog = read(&self.catalog)?;

        let matches: Vec<CatalogMatch> = catalog
            .values()
            .map(|entry| CatalogMatch {
                title: entry.course.title.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        Ok(rank(matches, |m| m.score, limit))
    }

    async fn search_content(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let content = read(&self.content)?;

        let hits: Vec<ScoredChunk> = content
            .values()
            .filter(|entry| filter.matches(&entry.chunk))
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        Ok(rank(hits, |h| h.score, limit))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let catalog = read(&self.catalog)?;
        Ok(catalog.get(title).map(|entry| entry.course.clone()))
    }

    async fn list_courses(&self) -> Result<Vec<IndexedCourse>> {
        let catalog = read(&self.catalog)?;
        let content = read(&self.content)?;

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for entry in content.values() {
            *counts.entry(entry.chunk.course_title.as_str()).or_default() += 1;
        }

        let mut courses: Vec<IndexedCourse> = catalog
            .values()
            .map(|entry| IndexedCourse {
                course: entry.course.clone(),
                chunk_count: counts
                    .get(entry.course.title.as_str())
                    .copied()
                    .unwrap_or(0),
                indexed_at: entry.indexed_at,
            })
            .collect();
        courses.sort_by(|a, b| a.course.title.cmp(&b.course.title));

        Ok(courses)
    }

    async fn get_chunks(&self, course_title: &str) -> Result<Vec<CourseChunk>> {
        let content = read(&self.content)?;
        let mut chunks: Vec<CourseChunk> = content
            .values()
            .filter(|entry| entry.chunk.course_title == course_title)
            .map(|entry| entry.chunk.clone())
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn delete_course(&self, title: &str) -> Result<usize> {
        write(&self.catalog)?.remove(title);

        let mut content = write(&self.content)?;
        let initial_len = content.len();
        content.retain(|_, entry| entry.chunk.course_title != title);
        Ok(initial_len - content.len())
    }

    async fn course_count(&self) -> Result<usize> {
        Ok(read(&self.catalog)?.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(read(&self.content)?.len())
    }

    async fn clear(&self) -> Result<()> {
        write(&self.catalog)?.clear();
        write(&self.content)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(course: &str, lesson: Option<u32>, index: u32, text: &str) -> CourseChunk {
        CourseChunk {
            text: text.to_string(),
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert_course(&CatalogEntry::new(Course::new("Alpha"), vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert_course(&CatalogEntry::new(Course::new("Beta"), vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();

        let entries = vec![
            ContentEntry {
                chunk: chunk("Alpha", Some(1), 0, "Hello world"),
                embedding: vec![1.0, 0.0, 0.0],
            },
            ContentEntry {
                chunk: chunk("Alpha", Some(2), 1, "Goodbye world"),
                embedding: vec![0.7, 0.7, 0.0],
            },
            ContentEntry {
                chunk: chunk("Beta", None, 0, "Other course"),
                embedding: vec![0.9, 0.1, 0.0],
            },
        ];
        assert_eq!(store.upsert_chunks(&entries).await.unwrap(), 3);
        assert_eq!(store.chunk_count().await.unwrap(), 3);
        assert_eq!(store.course_count().await.unwrap(), 2);

        let all = store
            .search_content(&[1.0, 0.0, 0.0], &ContentFilter::default(), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].score >= all[1].score);

        let filtered = store
            .search_content(
                &[1.0, 0.0, 0.0],
                &ContentFilter {
                    course_title: Some("Alpha".to_string()),
                    lesson_number: Some(2),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk.text, "Goodbye world");

        let catalog = store.search_catalog(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(catalog[0].title, "Beta");

        let courses = store.list_courses().await.unwrap();
        assert_eq!(courses[0].course.title, "Alpha");
        assert_eq!(courses[0].chunk_count, 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id_and_delete() {
        let store = MemoryVectorStore::new();
        let entry = ContentEntry {
            chunk: chunk("Alpha", None, 0, "first"),
            embedding: vec![1.0],
        };
        store.upsert_chunks(&[entry.clone()]).await.unwrap();
        store
            .upsert_chunks(&[ContentEntry {
                chunk: chunk("Alpha", None, 0, "second"),
                ..entry
            }])
            .await
            .unwrap();

        let chunks = store.get_chunks("Alpha").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "second");

        assert_eq!(store.delete_course("Alpha").await.unwrap(), 1);
        assert_eq!(store.chunk_count().await.unwrap(), 0);

        store.clear().await.unwrap();
        assert_eq!(store.course_count().await.unwrap(), 0);
    }
}
