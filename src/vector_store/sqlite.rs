//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust. Exact-match content
//! filters are pushed into the SQL query.

use super::{
    cosine_similarity, rank, CatalogEntry, CatalogMatch, ContentEntry, ContentFilter,
    IndexedCourse, ScoredChunk, VectorStore,
};
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk, Lesson};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS catalog (
    title TEXT PRIMARY KEY,
    instructor TEXT,
    source_link TEXT,
    lessons_json TEXT NOT NULL,
    summary TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS content (
    course_title TEXT NOT NULL,
    lesson_number INTEGER,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (course_title, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_content_course ON content(course_title, lesson_number);
"#;

/// SQLite-based vector store.
///
/// All operations share one connection behind a mutex, so concurrent
/// readers are serialized. Each operation holds the lock only for its own
/// statement scan and never across an await point.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KursError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn course_from_row(
        title: String,
        instructor: Option<String>,
        source_link: Option<String>,
        lessons_json: &str,
    ) -> Result<Course> {
        let lessons: Vec<Lesson> = serde_json::from_str(lessons_json).map_err(|e| {
            KursError::VectorStore(format!("Failed to deserialize lessons for '{}': {}", title, e))
        })?;
        Ok(Course {
            title,
            instructor,
            source_link,
            lessons,
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, entry), fields(title = %entry.course.title))]
    async fn upsert_course(&self, entry: &CatalogEntry) -> Result<()> {
        let conn = self.lock()?;

        let lessons_json = serde_json::to_string(&entry.course.lessons)
            .map_err(|e| KursError::VectorStore(format!("Failed to serialize lessons: {}", e)))?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO catalog
            (title, instructor, source_link, lessons_json, summary, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.course.title,
                entry.course.instructor,
                entry.course.source_link,
                lessons_json,
                entry.summary,
                Self::embedding_to_bytes(&entry.embedding),
                entry.indexed_at.to_rfc3339(),
            ],
        )?;

        debug!("Upserted catalog entry");
        Ok(())
    }

    #[instrument(skip(self, entries))]
    async fn upsert_chunks(&self, entries: &[ContentEntry]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for entry in entries {
            let chunk = &entry.chunk;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO content
                (course_title, lesson_number, chunk_index, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index,
                    chunk.text,
                    Self::embedding_to_bytes(&entry.embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} chunks", entries.len());
        Ok(entries.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_catalog(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT title, embedding FROM catalog")?;

        let rows = stmt.query_map([], |row| {
            let title: String = row.get(0)?;
            let embedding_bytes: Vec<u8> = row.get(1)?;
            Ok((title, embedding_bytes))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (title, bytes) = row?;
            matches.push(CatalogMatch {
                score: cosine_similarity(query_embedding, &Self::bytes_to_embedding(&bytes)),
                title,
            });
        }

        Ok(rank(matches, |m| m.score, limit))
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_content(
        &self,
        query_embedding: &[f32],
        filter: &ContentFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, lesson_number, chunk_index, text, embedding
            FROM content
            WHERE (?1 IS NULL OR course_title = ?1)
              AND (?2 IS NULL OR lesson_number = ?2)
            "#,
        )?;

        let rows = stmt.query_map(params![filter.course_title, filter.lesson_number], |row| {
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((
                CourseChunk {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: row.get(2)?,
                    text: row.get(3)?,
                },
                embedding_bytes,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk, bytes) = row?;
            hits.push(ScoredChunk {
                score: cosine_similarity(query_embedding, &Self::bytes_to_embedding(&bytes)),
                chunk,
            });
        }

        let hits = rank(hits, |h| h.score, limit);
        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT title, instructor, source_link, lessons_json FROM catalog WHERE title = ?1",
                params![title],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(title, instructor, link, lessons)| {
            Self::course_from_row(title, instructor, link, &lessons)
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn list_courses(&self) -> Result<Vec<IndexedCourse>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT c.title, c.instructor, c.source_link, c.lessons_json, c.indexed_at,
                   (SELECT COUNT(*) FROM content WHERE content.course_title = c.title)
            FROM catalog c
            ORDER BY c.title
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, u32>(5)?,
            ))
        })?;

        let mut courses = Vec::new();
        for row in rows {
            let (title, instructor, link, lessons, indexed_at, chunk_count) = row?;
            courses.push(IndexedCourse {
                course: Self::course_from_row(title, instructor, link, &lessons)?,
                chunk_count,
                indexed_at: Self::parse_timestamp(&indexed_at),
            });
        }

        Ok(courses)
    }

    #[instrument(skip(self))]
    async fn get_chunks(&self, course_title: &str) -> Result<Vec<CourseChunk>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT course_title, lesson_number, chunk_index, text
            FROM content
            WHERE course_title = ?1
            ORDER BY chunk_index
            "#,
        )?;

        let chunks = stmt
            .query_map(params![course_title], |row| {
                Ok(CourseChunk {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: row.get(2)?,
                    text: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Found {} chunks for course {}", chunks.len(), course_title);
        Ok(chunks)
    }

    #[instrument(skip(self))]
    async fn delete_course(&self, title: &str) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM catalog WHERE title = ?1", params![title])?;
        let deleted = tx.execute("DELETE FROM content WHERE course_title = ?1", params![title])?;
        tx.commit()?;

        info!("Deleted {} chunks for course {}", deleted, title);
        Ok(deleted)
    }

    async fn course_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM catalog", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM content; DELETE FROM catalog;")?;
        info!("Cleared vector store");
        Ok(())
    }
}
