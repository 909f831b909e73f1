//! Outline command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::tools::format_outline;
use anyhow::Result;

/// Run the outline command.
pub async fn run_outline(course_name: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let index = orchestrator.index();

    let course = match index.resolve_course_name(course_name).await? {
        Some(title) => index.course(&title).await?,
        None => None,
    };

    match course {
        Some(course) => println!("\n{}\n", format_outline(&course)),
        None => Output::warning(&format!("No course found matching '{}'", course_name)),
    }

    Ok(())
}
