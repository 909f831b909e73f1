//! Pipeline orchestrator for Kurs.
//!
//! Coordinates course ingestion (parse, chunk, embed, index) and question
//! answering (sessions, tools, agent).

use crate::agent::{Agent, ToolCallRecord};
use crate::chunking::{Chunker, ChunkingConfig, SentenceChunker};
use crate::config::{Prompts, Settings, VectorStoreProvider};
use crate::document::{is_supported, parse_course_document, read_course_document, ParsedDocument};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{KursError, Result};
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::models::{Course, Source};
use crate::session::SessionManager;
use crate::tools::{CourseOutlineTool, CourseSearchTool, ToolRegistry};
use crate::vector_store::{CourseIndex, MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
    #[serde(skip)]
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Outcome of ingesting a folder of course documents.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Titles of newly indexed courses.
    pub courses_added: Vec<String>,
    pub chunks_added: usize,
    /// Titles already indexed, left untouched.
    pub skipped: Vec<String>,
    /// Documents that could not be ingested, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// Catalog statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Result of ingesting a single document.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Added { course: Course, chunks: usize },
    /// A course with this title is already indexed.
    Skipped { title: String },
}

/// The main orchestrator for the Kurs pipeline.
pub struct Orchestrator {
    settings: Settings,
    index: Arc<CourseIndex>,
    chunker: Arc<dyn Chunker>,
    agent: Agent,
    sessions: SessionManager,
}

impl Orchestrator {
    /// Create an orchestrator from settings, using the configured providers.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let timeout = Duration::from_secs(settings.rag.timeout_secs);
        let embedder = create_embedder(&settings.embedding, timeout)?;

        let vector_store: Arc<dyn VectorStore> = match settings.vector_store.provider {
            VectorStoreProvider::Sqlite => Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?),
            VectorStoreProvider::Memory => Arc::new(MemoryVectorStore::new()),
        };

        let model = OpenAIChatModel::new(&settings.rag.model, timeout, settings.rag.api_base.as_deref())?
            .with_temperature(settings.rag.temperature)
            .with_max_tokens(settings.rag.max_tokens);

        Self::with_components(settings, prompts, embedder, vector_store, Arc::new(model))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        if settings.chunking.chunk_size == 0 {
            return Err(KursError::Config("chunking.chunk_size must be positive".to_string()));
        }

        let index = Arc::new(
            CourseIndex::new(vector_store, embedder, settings.rag.max_results)
                .with_min_course_similarity(settings.rag.min_course_similarity),
        );
        let chunker = Arc::new(SentenceChunker::new(ChunkingConfig::from(&settings.chunking)));
        let agent = Agent::new(model, Arc::new(prompts));
        let sessions =
            SessionManager::new(settings.rag.max_history).with_max_sessions(settings.rag.max_sessions);

        Ok(Self {
            settings,
            index,
            chunker,
            agent,
            sessions,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn index(&self) -> Arc<CourseIndex> {
        self.index.clone()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Fresh registry with every course tool, scoped to one query.
    pub fn tool_registry(&self) -> ToolRegistry {
        ToolRegistry::new()
            .with_tool(Arc::new(CourseSearchTool::new(self.index.clone())))
            .with_tool(Arc::new(CourseOutlineTool::new(self.index.clone())))
    }

    /// Answer a question. A new session is started when none is given.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        if query.trim().is_empty() {
            return Err(KursError::InvalidInput("query is empty".to_string()));
        }

        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create_session()?,
        };
        let history = self.sessions.history(&session_id)?;

        let registry = self.tool_registry();
        let response = self.agent.run(query, history.as_deref(), &registry).await?;

        self.sessions.add_exchange(&session_id, query, &response.answer)?;
        info!(
            "Answered with {} sources after {} model calls",
            response.sources.len(),
            response.invocations
        );

        Ok(QueryResponse {
            answer: response.answer,
            sources: response.sources,
            session_id,
            tool_calls: response.tool_calls,
        })
    }

    /// Ingest a parsed document unless its course title is already indexed.
    #[instrument(skip(self, document), fields(title = %document.course.title))]
    pub async fn add_parsed_document(&self, document: &ParsedDocument) -> Result<IngestOutcome> {
        let title = &document.course.title;
        if self.index.course_exists(title).await? {
            info!("Course '{}' is already indexed, skipping", title);
            return Ok(IngestOutcome::Skipped {
                title: title.clone(),
            });
        }

        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            warn!("Course '{}' has no text to index", title);
        }

        // Leftovers of an interrupted ingest would break index contiguity.
        let stale = self.index.remove_course(title).await?;
        if stale > 0 {
            warn!("Removed {} chunks left by an incomplete ingest of '{}'", stale, title);
        }

        // Catalog entry last: its presence marks the course as fully indexed.
        let added = self.index.add_chunks(&chunks).await?;
        self.index.add_course(&document.course).await?;

        info!("Indexed course '{}' with {} chunks", title, added);
        Ok(IngestOutcome::Added {
            course: document.course.clone(),
            chunks: added,
        })
    }

    /// Ingest course text. `fallback_title` names the course when the text
    /// has no title header.
    pub async fn add_course_text(&self, text: &str, fallback_title: &str) -> Result<IngestOutcome> {
        let document = parse_course_document(text, fallback_title)?;
        self.add_parsed_document(&document).await
    }

    /// Ingest one course document from disk.
    pub async fn add_course_document(&self, path: &Path) -> Result<IngestOutcome> {
        let document = read_course_document(path)?;
        self.add_parsed_document(&document).await
    }

    /// Replace an indexed course with the contents of a document.
    pub async fn reindex_course_document(&self, path: &Path) -> Result<IngestOutcome> {
        let document = read_course_document(path)?;
        let removed = self.index.remove_course(&document.course.title).await?;
        debug!("Removed {} chunks of '{}'", removed, document.course.title);
        self.add_parsed_document(&document).await
    }

    /// Ingest every supported document in a folder (not recursive).
    ///
    /// Failures are recorded per document and do not stop the batch.
    #[instrument(skip(self))]
    pub async fn add_course_folder(&self, folder: &Path, clear_existing: bool) -> Result<IngestReport> {
        if !folder.is_dir() {
            return Err(KursError::InvalidInput(format!(
                "not a directory: {}",
                folder.display()
            )));
        }

        if clear_existing {
            info!("Clearing existing course data");
            self.index.clear().await?;
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut report = IngestReport::default();
        for path in paths {
            if !is_supported(&path) {
                debug!("Skipping unsupported file {:?}", path);
                continue;
            }

            match self.add_course_document(&path).await {
                Ok(IngestOutcome::Added { course, chunks }) => {
                    report.courses_added.push(course.title);
                    report.chunks_added += chunks;
                }
                Ok(IngestOutcome::Skipped { title }) => report.skipped.push(title),
                Err(e) => {
                    warn!("Failed to ingest {:?}: {}", path, e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            "Ingested {} courses ({} chunks), skipped {}, failed {}",
            report.courses_added.len(),
            report.chunks_added,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.index.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }
}
