//! `search_course_content`: semantic search over course text.

use super::{parse_arguments, Tool, ToolDefinition, ToolName, ToolOutput};
use crate::error::Result;
use crate::models::{Course, Source};
use crate::vector_store::{CourseIndex, SearchError, SearchHit};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches course content with optional course and lesson filters.
pub struct CourseSearchTool {
    index: Arc<CourseIndex>,
}

impl CourseSearchTool {
    pub fn new(index: Arc<CourseIndex>) -> Self {
        Self { index }
    }

    /// Message for a search with nothing to show.
    fn no_results(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
        let mut message = String::from("No relevant content found");
        if let Some(name) = course_name {
            message.push_str(&format!(" in course '{}'", name));
        }
        if let Some(n) = lesson_number {
            message.push_str(&format!(" in lesson {}", n));
        }
        message.push('.');
        message
    }

    fn header(hit: &SearchHit) -> String {
        format!("[{}]", hit.label())
    }

    fn source_for(hit: &SearchHit, course: Option<&Course>) -> Source {
        let link = course.and_then(|c| c.lesson_link(hit.chunk.lesson_number));
        Source::new(hit.label(), link)
    }

    async fn format_hits(&self, hits: &[SearchHit]) -> Result<ToolOutput> {
        let mut courses: HashMap<String, Option<Course>> = HashMap::new();
        for hit in hits {
            if !courses.contains_key(&hit.chunk.course_title) {
                let course = self.index.course(&hit.chunk.course_title).await?;
                courses.insert(hit.chunk.course_title.clone(), course);
            }
        }

        let blocks: Vec<String> = hits
            .iter()
            .map(|hit| format!("{}\n{}", Self::header(hit), hit.chunk.text))
            .collect();
        let sources = hits
            .iter()
            .map(|hit| {
                let course = courses.get(&hit.chunk.course_title).and_then(Option::as_ref);
                Self::source_for(hit, course)
            })
            .collect();

        Ok(ToolOutput {
            content: blocks.join("\n\n"),
            sources,
        })
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolName::SearchCourseContent,
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    #[instrument(skip_all)]
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput> {
        let args: SearchArgs = parse_arguments(ToolName::SearchCourseContent, arguments)?;
        let course_name = args.course_name.as_deref().filter(|n| !n.trim().is_empty());

        let results = self
            .index
            .search(&args.query, course_name, args.lesson_number, None)
            .await?;

        match results.error {
            Some(error @ SearchError::CourseNotFound(_)) => Ok(ToolOutput::text(error.to_string())),
            Some(SearchError::EmptyIndex) => Ok(ToolOutput::text(Self::no_results(
                course_name,
                args.lesson_number,
            ))),
            None if results.hits.is_empty() => Ok(ToolOutput::text(Self::no_results(
                course_name,
                args.lesson_number,
            ))),
            None => self.format_hits(&results.hits).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{CourseChunk, Lesson};
    use crate::vector_store::MemoryVectorStore;

    fn empty_index() -> Arc<CourseIndex> {
        Arc::new(CourseIndex::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(256)),
            5,
        ))
    }

    async fn mcp_index() -> Arc<CourseIndex> {
        let index = empty_index();
        let mut course = Course::new("Intro to MCP");
        course.source_link = Some("https://example.com/mcp".to_string());
        course.lessons = vec![
            Lesson {
                number: 0,
                title: "Welcome".to_string(),
                link: None,
            },
            Lesson {
                number: 1,
                title: "Basics".to_string(),
                link: Some("https://example.com/mcp/1".to_string()),
            },
        ];
        index.add_course(&course).await.unwrap();
        index
            .add_chunks(&[
                CourseChunk {
                    text: "Welcome to the course.".to_string(),
                    course_title: "Intro to MCP".to_string(),
                    lesson_number: Some(0),
                    chunk_index: 0,
                },
                CourseChunk {
                    text: "MCP stands for Model Context Protocol.".to_string(),
                    course_title: "Intro to MCP".to_string(),
                    lesson_number: Some(1),
                    chunk_index: 1,
                },
            ])
            .await
            .unwrap();
        index
    }

    #[test]
    fn test_schema_contract() {
        let definition = CourseSearchTool::new(empty_index()).definition();
        assert_eq!(definition.name.as_str(), "search_course_content");
        assert_eq!(definition.parameters["required"], serde_json::json!(["query"]));
        assert_eq!(definition.parameters["properties"]["course_name"]["type"], "string");
        assert_eq!(definition.parameters["properties"]["lesson_number"]["type"], "integer");
    }

    #[tokio::test]
    async fn test_empty_index_reports_no_content() {
        let tool = CourseSearchTool::new(empty_index());
        let output = tool
            .execute(serde_json::json!({"query": "What is covered in Lesson 1?"}))
            .await
            .unwrap();
        assert_eq!(output.content, "No relevant content found.");
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_filtered_search_formats_and_cites() {
        let tool = CourseSearchTool::new(mcp_index().await);
        let output = tool
            .execute(serde_json::json!({
                "query": "What does MCP stand for?",
                "course_name": "MCP",
                "lesson_number": 1
            }))
            .await
            .unwrap();

        assert_eq!(
            output.content,
            "[Intro to MCP - Lesson 1]\nMCP stands for Model Context Protocol."
        );
        assert_eq!(
            output.sources,
            vec![Source::new(
                "Intro to MCP - Lesson 1",
                Some("https://example.com/mcp/1".to_string())
            )]
        );
    }

    #[tokio::test]
    async fn test_lesson_without_link_cites_course_link() {
        let tool = CourseSearchTool::new(mcp_index().await);
        let output = tool
            .execute(serde_json::json!({"query": "welcome", "lesson_number": 0}))
            .await
            .unwrap();
        assert_eq!(output.sources[0].link.as_deref(), Some("https://example.com/mcp"));
    }

    #[tokio::test]
    async fn test_unknown_course_message() {
        let tool = CourseSearchTool::new(mcp_index().await);
        let output = tool
            .execute(serde_json::json!({"query": "x", "course_name": "Nonexistent Course"}))
            .await
            .unwrap();
        assert_eq!(output.content, "No course found matching 'Nonexistent Course'");
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_no_matches_describes_filters() {
        let tool = CourseSearchTool::new(mcp_index().await);
        let output = tool
            .execute(serde_json::json!({"query": "x", "course_name": "MCP", "lesson_number": 9}))
            .await
            .unwrap();
        assert_eq!(output.content, "No relevant content found in course 'MCP' in lesson 9.");
    }

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let tool = CourseSearchTool::new(empty_index());
        let err = tool
            .execute(serde_json::json!({"course_name": "MCP"}))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::KursError::InvalidToolArguments(_)));
    }
}
