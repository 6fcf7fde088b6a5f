//! Lesson knowledge: short notes injected when the student names a topic.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub topic: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct LessonsFile {
    #[serde(default)]
    lessons: Vec<Lesson>,
}

/// The lessons table, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct LessonBook {
    lessons: Vec<Lesson>,
}

impl LessonBook {
    pub fn new(lessons: Vec<Lesson>) -> Self {
        Self { lessons }
    }

    /// Load `{"lessons": [...]}` from disk.
    ///
    /// A missing or malformed file yields an empty book and a warning.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Lessons file unavailable, knowledge is empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<LessonsFile>(&content) {
            Ok(file) => {
                info!(path = %path.display(), count = file.lessons.len(), "Loaded lessons");
                Self::new(file.lessons)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Lessons file malformed, knowledge is empty");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    /// Content of every lesson whose topic appears in `message`, one per line.
    ///
    /// Empty when nothing matches. Blank topics never match.
    pub fn relevant(&self, message: &str) -> String {
        let lowered = message.to_lowercase();
        self.lessons
            .iter()
            .filter(|l| {
                let topic = l.topic.trim().to_lowercase();
                !topic.is_empty() && lowered.contains(&topic)
            })
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
