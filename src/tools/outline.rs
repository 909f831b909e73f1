//! `get_course_outline`: course metadata and lesson list.

use super::{parse_arguments, Tool, ToolDefinition, ToolName, ToolOutput};
use crate::error::Result;
use crate::models::{Course, Source};
use crate::vector_store::CourseIndex;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_name: String,
}

/// Returns the outline of a course resolved from a fuzzy name.
pub struct CourseOutlineTool {
    index: Arc<CourseIndex>,
}

impl CourseOutlineTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }
}

/// Render a course outline as markdown.
pub fn format_outline(course: &Course) -> String {
    let mut lines = vec![
        format!("**Course Title:** {}", course.title),
        format!(
            "**Instructor:** {}",
            course.instructor.as_deref().unwrap_or("Unknown")
        ),
        format!(
            "**Course Link:** {}",
            course.source_link.as_deref().unwrap_or("Not available")
        ),
    ];

    if course.lessons.is_empty() {
        lines.push("No lesson information available.".to_string());
    } else {
        lines.push(format!("**Lessons:** ({} total)", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("- Lesson {}: {}", lesson.number, lesson.title));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolName::GetCourseOutline,
            description: "Get the outline of a course: title, instructor, link and the full lesson list"
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    #[instrument(skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: OutlineArgs = parse_arguments(ToolName::GetCourseOutline, arguments)?;

        let not_found = || ToolOutput::text(format!("No course found matching '{}'", args.course_name));

        let Some(title) = self.index.resolve_course_name(&args.course_name).await? else {
            return Ok(not_found());
        };
        let Some(course) = self.index.course(&title).await? else {
            return Ok(not_found());
        };

        Ok(ToolOutput {
            content: format_outline(&course),
            sources: vec![Source::new(course.title.clone(), course.source_link.clone())],
        })
    }
}
