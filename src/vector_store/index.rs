//! Course index: embedding and filter semantics over a [`VectorStore`].

use super::{CatalogEntry, ContentEntry, ContentFilter, IndexedCourse, VectorStore};
use crate::embedding::Embedder;
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Non-fatal search failures, reported alongside an empty hit list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A course filter was given but matched no catalog entry.
    CourseNotFound(String),
    /// The content collection has no entries.
    EmptyIndex,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CourseNotFound(name) => write!(f, "No course found matching '{}'", name),
            Self::EmptyIndex => write!(f, "The course index is empty"),
        }
    }
}

/// One retrieved chunk.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: CourseChunk,
    pub score: f32,
}

impl SearchHit {
    /// Citation label for this hit.
    pub fn label(&self) -> String {
        self.chunk.label()
    }
}

/// Result of [`CourseIndex::search`], best hit first.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Set when the search could not run as requested.
    pub error: Option<SearchError>,
    /// Course title the `course_name` filter resolved to.
    pub resolved_course: Option<String>,
}

impl SearchResults {
    fn failed(error: SearchError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Vector index over course catalog and content.
pub struct CourseIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    min_course_similarity: Option<f32>,
}

impl CourseIndex {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, max_results: usize) -> Self {
        Self {
            store,
            embedder,
            max_results,
            min_course_similarity: None,
        }
    }

    /// Require catalog matches to reach this similarity before a fuzzy
    /// course name resolves.
    pub fn with_min_course_similarity(mut self, threshold: Option<f32>) -> Self {
        self.min_course_similarity = threshold;
        self
    }

    /// Embed and insert (or overwrite) the catalog entry for a course.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn add_course(&self, course: &Course) -> Result<()> {
        let summary = course.catalog_summary();
        let embedding = self.embedder.embed(&summary).await?;
        self.store
            .upsert_course(&CatalogEntry::new(course.clone(), embedding))
            .await?;
        debug!("Added catalog entry");
        Ok(())
    }

    /// Embed and insert content chunks. Chunks with the same course title and
    /// index overwrite each other.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_chunks(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(KursError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<ContentEntry> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| ContentEntry { chunk, embedding })
            .collect();

        self.store.upsert_chunks(&entries).await
    }

    /// Resolve a fuzzy course name to an indexed course title.
    ///
    /// Tries an exact case-insensitive title match, then a unique substring
    /// match, then the closest catalog embedding.
    #[instrument(skip(self))]
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let titles = self.course_titles().await?;
        if titles.is_empty() {
            return Ok(None);
        }

        if let Some(title) = titles.iter().find(|t| t.to_lowercase() == needle) {
            return Ok(Some(title.clone()));
        }

        let containing: Vec<&String> = titles
            .iter()
            .filter(|t| t.to_lowercase().contains(&needle))
            .collect();
        if let [only] = containing.as_slice() {
            debug!("Resolved '{}' to '{}' by substring", name, only);
            return Ok(Some((*only).clone()));
        }

        let embedding = self.embedder.embed(name).await?;
        let best = self.store.search_catalog(&embedding, 1).await?.into_iter().next();

        Ok(best.and_then(|m| {
            let accepted = m.score > 0.0
                && self
                    .min_course_similarity
                    .map_or(true, |threshold| m.score >= threshold);
            debug!(
                "Closest catalog match for '{}' is '{}' ({:.3}), accepted: {}",
                name, m.title, m.score, accepted
            );
            accepted.then_some(m.title)
        }))
    }

    /// Search course content.
    ///
    /// `course_name` is resolved fuzzily; `lesson_number` must match exactly.
    /// `limit` defaults to the configured maximum.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => return Ok(SearchResults::failed(SearchError::CourseNotFound(name.to_string()))),
            },
            None => None,
        };

        if self.store.chunk_count().await? == 0 {
            return Ok(SearchResults::failed(SearchError::EmptyIndex));
        }

        let filter = ContentFilter {
            course_title: course_title.clone(),
            lesson_number,
        };
        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .store
            .search_content(&embedding, &filter, limit.unwrap_or(self.max_results))
            .await?
            .into_iter()
            .map(|scored| SearchHit {
                chunk: scored.chunk,
                score: scored.score,
            })
            .collect::<Vec<_>>();

        info!("Search returned {} hits", hits.len());

        Ok(SearchResults {
            hits,
            error: None,
            resolved_course: course_title,
        })
    }

    pub async fn course_exists(&self, title: &str) -> Result<bool> {
        Ok(self.store.get_course(title).await?.is_some())
    }

    /// Indexed course titles, sorted.
    pub async fn course_titles(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_courses()
            .await?
            .into_iter()
            .map(|c| c.course.title)
            .collect())
    }

    pub async fn course_count(&self) -> Result<usize> {
        self.store.course_count().await
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.chunk_count().await
    }

    pub async fn courses(&self) -> Result<Vec<IndexedCourse>> {
        self.store.list_courses().await
    }

    pub async fn course(&self, title: &str) -> Result<Option<Course>> {
        self.store.get_course(title).await
    }

    pub async fn chunks(&self, title: &str) -> Result<Vec<CourseChunk>> {
        self.store.get_chunks(title).await
    }

    /// Remove a course and its chunks.
    pub async fn remove_course(&self, title: &str) -> Result<usize> {
        self.store.delete_course(title).await
    }

    /// Remove all courses and chunks.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::Lesson;
    use crate::vector_store::MemoryVectorStore;

    fn index() -> CourseIndex {
        CourseIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(256)),
            5,
        )
    }

    fn course(title: &str, lessons: &[(u32, &str)]) -> Course {
        let mut course = Course::new(title);
        for (number, lesson_title) in lessons {
            course.lessons.push(Lesson {
                number: *number,
                title: lesson_title.to_string(),
                link: Some(format!("https://example.com/{}", number)),
            });
        }
        course
    }

    fn chunk(course: &str, lesson: Option<u32>, index: u32, text: &str) -> CourseChunk {
        CourseChunk {
            text: text.to_string(),
            course_title: course.to_string(),
            lesson_number: lesson,
            chunk_index: index,
        }
    }

    async fn populated() -> CourseIndex {
        let index = index();
        index
            .add_course(&course("Introduction to MCP", &[(0, "Welcome"), (1, "Protocol basics")]))
            .await
            .unwrap();
        index
            .add_course(&course("Building Towards Computer Use", &[(1, "Screenshots")]))
            .await
            .unwrap();
        index
            .add_chunks(&[
                chunk("Introduction to MCP", Some(0), 0, "Welcome to the protocol course."),
                chunk("Introduction to MCP", Some(1), 1, "MCP stands for Model Context Protocol."),
                chunk("Building Towards Computer Use", Some(1), 0, "Computer use relies on screenshots of the protocol."),
            ])
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_resolve_exact_and_substring() {
        let index = populated().await;

        assert_eq!(
            index.resolve_course_name("introduction to mcp").await.unwrap(),
            Some("Introduction to MCP".to_string())
        );
        assert_eq!(
            index.resolve_course_name("MCP").await.unwrap(),
            Some("Introduction to MCP".to_string())
        );
        assert_eq!(
            index.resolve_course_name("computer use").await.unwrap(),
            Some("Building Towards Computer Use".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_by_embedding_and_threshold() {
        let index = populated().await;
        assert_eq!(
            index.resolve_course_name("MCP protocol basics").await.unwrap(),
            Some("Introduction to MCP".to_string())
        );
        assert_eq!(index.resolve_course_name("zzzz qqqq").await.unwrap(), None);

        let strict = populated().await.with_min_course_similarity(Some(0.99));
        assert_eq!(strict.resolve_course_name("MCP protocol basics").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_on_empty_catalog() {
        assert_eq!(index().resolve_course_name("MCP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_filters_course_and_lesson() {
        let index = populated().await;

        let results = index
            .search("protocol", Some("MCP"), Some(1), None)
            .await
            .unwrap();
        assert!(results.error.is_none());
        assert_eq!(results.resolved_course.as_deref(), Some("Introduction to MCP"));
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].chunk.text, "MCP stands for Model Context Protocol.");
        assert_eq!(results.hits[0].label(), "Introduction to MCP - Lesson 1");

        let unfiltered = index.search("protocol", None, None, Some(2)).await.unwrap();
        assert_eq!(unfiltered.hits.len(), 2);
        assert!(unfiltered.hits[0].score >= unfiltered.hits[1].score);
    }

    #[tokio::test]
    async fn test_search_no_matches_under_valid_filter() {
        let index = populated().await;
        let results = index
            .search("protocol", Some("MCP"), Some(7), None)
            .await
            .unwrap();
        assert!(results.error.is_none());
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_errors() {
        let empty = index();
        let results = empty.search("anything", None, None, None).await.unwrap();
        assert_eq!(results.error, Some(SearchError::EmptyIndex));

        let index = populated().await;
        let results = index
            .search("anything", Some("Nonexistent Course"), None, None)
            .await
            .unwrap();
        assert_eq!(
            results.error,
            Some(SearchError::CourseNotFound("Nonexistent Course".to_string()))
        );
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_course_titles_are_sorted() {
        let index = populated().await;
        assert_eq!(
            index.course_titles().await.unwrap(),
            vec!["Building Towards Computer Use", "Introduction to MCP"]
        );
        assert!(index.course_exists("Introduction to MCP").await.unwrap());
    }
}
