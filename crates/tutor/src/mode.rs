//! Tutor modes: the instructional persona the student picked from the menu.

use serde::{Deserialize, Serialize};

/// A practice item: a question and the answer the tutor expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PracticeItem {
    pub question: &'static str,
    pub answer: &'static str,
}

/// Grammar practice item; a fresh grammar session is graded against it.
pub const GRAMMAR_ITEM: PracticeItem = PracticeItem {
    question: "Which sentence is correct: \"She go to school every day.\" or \"She goes to school every day.\"?",
    answer: "She goes to school every day.",
};

pub const VOCABULARY_ITEM: PracticeItem = PracticeItem {
    question: "What is a synonym for \"happy\"?",
    answer: "joyful",
};

pub const SENTENCE_ITEM: PracticeItem = PracticeItem {
    question: "Make a sentence using the words \"library\" and \"quietly\". What is your sentence?",
    answer: "I read quietly in the library.",
};

/// The tutor mode selected for a request.
///
/// Unrecognized names map to [`TutorMode::Unknown`], which adds no
/// instructions to the base persona. An unknown mode is never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorMode {
    Grammar,
    Vocabulary,
    Sentence,
    Conversation,
    /// The activity menu prompt, kept for older clients.
    Menu,
    Unknown,
}

impl TutorMode {
    /// Parse a mode name from a request. Case and surrounding spaces are ignored.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("grammar") => TutorMode::Grammar,
            Some("vocabulary") | Some("vocab") => TutorMode::Vocabulary,
            Some("sentence") => TutorMode::Sentence,
            Some("conversation") => TutorMode::Conversation,
            Some("menu") => TutorMode::Menu,
            _ => TutorMode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TutorMode::Grammar => "grammar",
            TutorMode::Vocabulary => "vocabulary",
            TutorMode::Sentence => "sentence",
            TutorMode::Conversation => "conversation",
            TutorMode::Menu => "menu",
            TutorMode::Unknown => "unknown",
        }
    }

    /// Instruction text appended to the base persona.
    pub fn instructions(&self) -> &'static str {
        match self {
            TutorMode::Grammar => {
                "Mode: GRAMMAR PRACTICE.\n\
                 Ask one grammar question at a time (subject-verb agreement, tenses, articles, prepositions).\n\
                 When the student answers, say whether it is correct, explain the rule in one or two sentences, \
                 then ask the next question on its own line ending with a question mark."
            }
            TutorMode::Vocabulary => {
                "Mode: VOCABULARY BUILDING.\n\
                 Teach one word at a time: meaning, a synonym, an antonym and an example sentence.\n\
                 Then quiz the student with one question on its own line ending with a question mark."
            }
            TutorMode::Sentence => {
                "Mode: SENTENCE CONSTRUCTION.\n\
                 Give the student words or a situation and ask them to write a complete sentence.\n\
                 Correct their sentence gently, show an improved version, \
                 then give the next task as a question on its own line ending with a question mark."
            }
            TutorMode::Conversation => {
                "Mode: CONVERSATION PRACTICE.\n\
                 Chat naturally about everyday topics in simple English.\n\
                 Keep replies short, correct mistakes kindly, and end with a follow-up question."
            }
            TutorMode::Menu => {
                "If the student has not chosen an activity, offer this menu:\n\
                 1. Grammar practice\n\
                 2. Vocabulary building\n\
                 3. Sentence construction\n\
                 4. Conversation practice\n\
                 Start the activity they pick."
            }
            TutorMode::Unknown => "",
        }
    }

    /// Default sampling temperature. Configuration may override it.
    pub fn default_temperature(&self) -> f32 {
        match self {
            TutorMode::Grammar => 0.3,
            TutorMode::Sentence => 0.4,
            TutorMode::Vocabulary => 0.5,
            TutorMode::Conversation => 0.8,
            TutorMode::Menu | TutorMode::Unknown => 0.7,
        }
    }

    /// Whether the mode quizzes the student and replays the previous question.
    pub fn tracks_turns(&self) -> bool {
        matches!(
            self,
            TutorMode::Grammar | TutorMode::Vocabulary | TutorMode::Sentence
        )
    }

    /// Hard-coded practice item for quiz modes.
    ///
    /// A new quiz session starts from this item's question, and after each
    /// quiz turn the expected answer is reset to this item's
    /// answer rather than derived from the model's reply.
    pub fn fallback_item(&self) -> Option<PracticeItem> {
        match self {
            TutorMode::Grammar => Some(GRAMMAR_ITEM),
            TutorMode::Vocabulary => Some(VOCABULARY_ITEM),
            TutorMode::Sentence => Some(SENTENCE_ITEM),
            _ => None,
        }
    }
}

impl std::fmt::Display for TutorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
