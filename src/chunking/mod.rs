//! Content chunking for breaking course documents into searchable segments.
//!
//! Chunks are sentence-aligned, bounded by a character budget, and overlap
//! their predecessor by a few trailing sentences. A chunk never spans two
//! lessons.

mod sentence;

pub use sentence::{chunk_text, split_sentences};

use crate::config::ChunkingSettings;
use crate::document::ParsedDocument;
use crate::models::CourseChunk;
use tracing::debug;

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated in the next chunk.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

/// Trait for content chunking implementations.
pub trait Chunker: Send + Sync {
    /// Split a parsed document into chunks with contiguous indices from 0.
    /// Documents without usable text yield no chunks.
    fn chunk(&self, document: &ParsedDocument) -> Vec<CourseChunk>;
}

/// Sentence-respecting chunker with overlap.
#[derive(Debug, Clone, Default)]
pub struct SentenceChunker {
    config: ChunkingConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &ParsedDocument) -> Vec<CourseChunk> {
        let course_title = &document.course.title;
        let mut chunks = Vec::new();

        for (lesson_number, text) in document.segments() {
            for piece in chunk_text(text, self.config.chunk_size, self.config.chunk_overlap) {
                chunks.push(CourseChunk {
                    text: piece,
                    course_title: course_title.clone(),
                    lesson_number,
                    chunk_index: chunks.len() as u32,
                });
            }
        }

        debug!("Chunked '{}' into {} chunks", course_title, chunks.len());
        chunks
    }
}
