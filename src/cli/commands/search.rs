//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::vector_store::SearchError;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.index().search(query, course, lesson, limit).await;
    spinner.finish_and_clear();

    let results = match results {
        Ok(results) => results,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    match &results.error {
        Some(SearchError::EmptyIndex) => {
            Output::warning("No courses indexed yet. Use 'kurs ingest <folder>' first.");
        }
        Some(error @ SearchError::CourseNotFound(_)) => {
            Output::warning(&error.to_string());
        }
        None if results.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        None => {
            if let Some(title) = &results.resolved_course {
                Output::kv("Course", title);
            }
            Output::success(&format!("Found {} results", results.hits.len()));
            for hit in &results.hits {
                Output::search_result(&hit.label(), hit.score, &hit.chunk.text);
            }
        }
    }

    Ok(())
}
