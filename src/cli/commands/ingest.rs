//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{IngestOutcome, IngestReport, Orchestrator};
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command on a single document or a folder of documents.
pub async fn run_ingest(
    path: Option<String>,
    clear: bool,
    force: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'kurs doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let path = path
        .map(|p| Settings::expand_path(&p))
        .unwrap_or_else(|| settings.docs_dir());

    if !path.exists() {
        Output::error(&format!("Path not found: {}", path.display()));
        anyhow::bail!("Path not found: {}", path.display());
    }

    let orchestrator = Orchestrator::new(settings)?;

    if path.is_dir() {
        if force {
            Output::warning("--force applies to single documents; use --clear to rebuild a folder.");
        }
        let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
        let report = orchestrator.add_course_folder(&path, clear).await;
        spinner.finish_and_clear();

        print_report(&report?);
    } else {
        if clear {
            Output::warning("--clear applies to folders and was ignored.");
        }
        ingest_file(&orchestrator, path, force).await?;
    }

    let analytics = orchestrator.course_analytics().await?;
    Output::kv("Courses indexed", &analytics.total_courses.to_string());
    Output::kv("Chunks indexed", &orchestrator.index().chunk_count().await?.to_string());

    Ok(())
}

async fn ingest_file(orchestrator: &Orchestrator, path: PathBuf, force: bool) -> Result<()> {
    let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
    let outcome = if force {
        orchestrator.reindex_course_document(&path).await
    } else {
        orchestrator.add_course_document(&path).await
    };
    spinner.finish_and_clear();

    match outcome {
        Ok(IngestOutcome::Added { course, chunks }) => {
            Output::success(&format!(
                "Indexed '{}' ({} lessons, {} chunks)",
                course.title,
                course.lessons.len(),
                chunks
            ));
        }
        Ok(IngestOutcome::Skipped { title }) => {
            Output::info(&format!(
                "'{}' is already indexed. Use --force to re-index it.",
                title
            ));
        }
        Err(e) => {
            Output::error(&format!("Failed to index {}: {}", path.display(), e));
            return Err(e.into());
        }
    }

    Ok(())
}

fn print_report(report: &IngestReport) {
    if report.courses_added.is_empty() {
        Output::info("No new courses indexed.");
    } else {
        Output::success(&format!(
            "Indexed {} new course(s), {} chunks",
            report.courses_added.len(),
            report.chunks_added
        ));
        for title in &report.courses_added {
            Output::list_item(title);
        }
    }

    if !report.skipped.is_empty() {
        Output::info(&format!("Skipped {} already indexed course(s)", report.skipped.len()));
    }

    for (path, reason) in &report.failed {
        Output::warning(&format!("Failed {}: {}", path.display(), reason));
    }
}
