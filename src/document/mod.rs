//! Course document parsing.
//!
//! Turns raw document text into a [`Course`] plus the lesson boundary markers
//! the chunker uses to attribute text to lessons. Expected layout:
//!
//! ```text
//! Course Title: Intro to MCP
//! Course Link: https://example.com/mcp
//! Course Instructor: Jane Doe
//!
//! Lesson 0: Introduction
//! Lesson Link: https://example.com/mcp/0
//! Lesson text...
//! ```

use crate::error::{KursError, Result};
use crate::models::{Course, Lesson};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// File extensions read as plain course text.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Start of a lesson inside the document body.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonMarker {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
    /// Byte offset into the body where the lesson's content begins.
    pub start_offset: usize,
    /// Byte offset into the body where the lesson's content ends.
    pub end_offset: usize,
}

/// A parsed course document ready for chunking.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub course: Course,
    /// Document text after the course header.
    pub body: String,
    pub markers: Vec<LessonMarker>,
    /// End of the course-level text that precedes the first lesson.
    preamble_end: usize,
}

impl ParsedDocument {
    /// Text segments in document order, tagged with their lesson number.
    /// Course-level text before the first lesson has no lesson number.
    pub fn segments(&self) -> Vec<(Option<u32>, &str)> {
        let mut segments = Vec::with_capacity(self.markers.len() + 1);

        let preamble = &self.body[..self.preamble_end];
        if !preamble.trim().is_empty() {
            segments.push((None, preamble));
        }

        for marker in &self.markers {
            segments.push((
                Some(marker.number),
                &self.body[marker.start_offset..marker.end_offset],
            ));
        }

        segments
    }
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*course\s+(title|link|instructor)\s*:\s*(.*?)\s*$")
            .expect("valid header regex")
    })
}

fn lesson_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*lesson\s+(\d+)\s*:\s*(.*?)\s*$").expect("valid lesson regex")
    })
}

fn lesson_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*lesson\s+link\s*:\s*(.*?)\s*$").expect("valid lesson link regex")
    })
}

/// Keep a link only if it parses as a URL.
fn valid_link(raw: &str, context: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match url::Url::parse(raw) {
        Ok(_) => Some(raw.to_string()),
        Err(e) => {
            warn!("Ignoring invalid {} link {:?}: {}", context, raw, e);
            None
        }
    }
}

/// Derive a course title from a file path when the header has none.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled Course".to_string())
}

/// Whether the path has an extension this parser reads.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parse a course document.
///
/// `fallback_title` is used when the header carries no `Course Title:` line.
/// Empty documents are rejected with [`KursError::IngestionParse`].
pub fn parse_course_document(text: &str, fallback_title: &str) -> Result<ParsedDocument> {
    if text.trim().is_empty() {
        return Err(KursError::IngestionParse(format!(
            "document '{}' is empty",
            fallback_title
        )));
    }

    let mut title: Option<String> = None;
    let mut instructor: Option<String> = None;
    let mut source_link: Option<String> = None;

    // Header: leading blank lines and `Course X:` lines.
    let mut body_start = 0;
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            body_start += line.len();
            continue;
        }
        let Some(caps) = header_regex().captures(line) else {
            break;
        };
        let value = caps[2].to_string();
        match caps[1].to_lowercase().as_str() {
            "title" if !value.is_empty() => title = Some(value),
            "instructor" if !value.is_empty() => instructor = Some(value),
            "link" => source_link = valid_link(&value, "course"),
            _ => {}
        }
        body_start += line.len();
    }

    let body = text[body_start..].to_string();
    let mut course = Course::new(title.unwrap_or_else(|| fallback_title.to_string()));
    course.instructor = instructor;
    course.source_link = source_link;

    let mut markers: Vec<LessonMarker> = Vec::new();
    let mut preamble_end = body.len();
    let mut offset = 0;
    let mut expecting_link = false;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if expecting_link {
            if line.trim().is_empty() {
                if let Some(last) = markers.last_mut() {
                    last.start_offset = offset;
                }
                continue;
            }
            expecting_link = false;
            if let Some(caps) = lesson_link_regex().captures(line) {
                if let Some(last) = markers.last_mut() {
                    last.link = valid_link(&caps[1], "lesson");
                    last.start_offset = offset;
                }
                continue;
            }
        }

        if let Some(caps) = lesson_regex().captures(line) {
            let Ok(number) = caps[1].parse::<u32>() else {
                continue;
            };

            match markers.last_mut() {
                Some(prev) => prev.end_offset = line_start,
                None => preamble_end = line_start,
            }

            markers.push(LessonMarker {
                number,
                title: caps[2].to_string(),
                link: None,
                start_offset: offset,
                end_offset: body.len(),
            });
            expecting_link = true;
        }
    }

    for marker in &markers {
        if course.lesson(marker.number).is_some() {
            warn!(
                "Duplicate lesson {} in course '{}'; keeping the first",
                marker.number, course.title
            );
            continue;
        }
        course.lessons.push(Lesson {
            number: marker.number,
            title: marker.title.clone(),
            link: marker.link.clone(),
        });
    }

    debug!(
        "Parsed course '{}' with {} lessons",
        course.title,
        course.lessons.len()
    );

    Ok(ParsedDocument {
        course,
        body,
        markers,
        preamble_end,
    })
}

/// Read and parse a course document from disk.
pub fn read_course_document(path: &Path) -> Result<ParsedDocument> {
    if !is_supported(path) {
        return Err(KursError::IngestionParse(format!(
            "unsupported file type: {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        KursError::IngestionParse(format!("{} is not valid UTF-8: {}", path.display(), e))
    })?;

    parse_course_document(&text, &title_from_path(path))
}
