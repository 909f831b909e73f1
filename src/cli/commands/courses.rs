//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let courses = match orchestrator.index().courses().await {
        Ok(courses) => courses,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if courses.is_empty() {
        Output::info("No courses indexed yet. Use 'kurs ingest <folder>' to add course documents.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", courses.len()));
    println!();

    for item in &courses {
        Output::course_info(
            &item.course.title,
            item.course.instructor.as_deref(),
            item.course.lessons.len(),
            item.chunk_count,
        );
    }

    let total_chunks: u32 = courses.iter().map(|c| c.chunk_count).sum();
    println!();
    Output::kv("Total courses", &courses.len().to_string());
    Output::kv("Total chunks", &total_chunks.to_string());

    Ok(())
}
