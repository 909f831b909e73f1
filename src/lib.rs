//! Kurs - Question answering over course materials
//!
//! A local-first tool that indexes course documents into a vector store and
//! answers questions with a tool-calling language model that cites the
//! lessons it drew from.
//!
//! # Overview
//!
//! Kurs allows you to:
//! - Ingest course documents (title, instructor, lessons) from a folder
//! - Search course content, filtered by course name or lesson number
//! - Ask questions and get answers with lesson-level sources
//! - Keep short conversations with per-session history
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `document` - Course document parsing
//! - `chunking` - Sentence-aware content chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Catalog and content collections, course search
//! - `tools` - Tools the model can call, and their registry
//! - `llm` - Chat model abstraction
//! - `agent` - Two-phase tool-calling loop
//! - `session` - Conversation history
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use kurs::config::Settings;
//! use kurs::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let report = orchestrator
//!         .add_course_folder(std::path::Path::new("docs"), false)
//!         .await?;
//!     println!("Indexed {} courses", report.courses_added.len());
//!
//!     let response = orchestrator.query("What is covered in lesson 1?", None).await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod session;
pub mod tools;
pub mod vector_store;

pub use error::{KursError, Result};
