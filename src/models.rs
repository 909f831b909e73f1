//! Course data model shared by ingestion, indexing and retrieval.

use serde::{Deserialize, Serialize};

/// A lesson within a course. Lesson numbers are unique per course only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub number: u32,
    pub title: String,
    pub link: Option<String>,
}

/// A course built from one ingested document. The title is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub instructor: Option<String>,
    pub source_link: Option<String>,
    /// Lessons in document order.
    pub lessons: Vec<Lesson>,
}

impl Course {
    /// Create a course with no lessons.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instructor: None,
            source_link: None,
            lessons: Vec::new(),
        }
    }

    /// Find a lesson by number.
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }

    /// Link for citing a lesson, falling back to the course link.
    pub fn lesson_link(&self, number: Option<u32>) -> Option<String> {
        number
            .and_then(|n| self.lesson(n))
            .and_then(|lesson| lesson.link.clone())
            .or_else(|| self.source_link.clone())
    }

    /// Text embedded into the catalog collection for course-name resolution.
    pub fn catalog_summary(&self) -> String {
        let mut summary = self.title.clone();
        if let Some(instructor) = &self.instructor {
            summary.push_str(&format!("\nInstructor: {}", instructor));
        }
        for lesson in &self.lessons {
            summary.push_str(&format!("\nLesson {}: {}", lesson.number, lesson.title));
        }
        summary
    }
}

/// A bounded span of course text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub text: String,
    pub course_title: String,
    pub lesson_number: Option<u32>,
    /// Position within the course, contiguous from 0.
    pub chunk_index: u32,
}

impl CourseChunk {
    /// Storage key. Titles are kept verbatim so distinct titles never collide.
    pub fn key(&self) -> (String, u32) {
        (self.course_title.clone(), self.chunk_index)
    }

    /// Citation label, e.g. `Intro to MCP - Lesson 1`.
    pub fn label(&self) -> String {
        match self.lesson_number {
            Some(n) => format!("{} - Lesson {}", self.course_title, n),
            None => self.course_title.clone(),
        }
    }
}

/// A citation for an answer: display label plus an optional link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub display: String,
    pub link: Option<String>,
}

impl Source {
    pub fn new(display: impl Into<String>, link: Option<String>) -> Self {
        Self {
            display: display.into(),
            link,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.link {
            Some(link) => write!(f, "{} ({})", self.display, link),
            None => write!(f, "{}", self.display),
        }
    }
}
