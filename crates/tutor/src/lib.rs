//! ChatPTK tutor — decides how each student message is answered.
//!
//! Most messages go to the language model, wrapped in a tutor persona and
//! a short recap of the previous question. A few never leave the process:
//! identity and meta questions, greetings, and questions about the
//! student's own record.
//!
//! The entry point is [`TutorPipeline`].

pub mod completion;
pub mod composer;
pub mod lessons;
pub mod mode;
pub mod pipeline;
pub mod responder;
pub mod roster;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use completion::{APOLOGY, CompletionGateway, Fragment, FragmentStream, UpstreamError};
pub use lessons::{Lesson, LessonBook};
pub use mode::{GRAMMAR_ITEM, PracticeItem, SENTENCE_ITEM, TutorMode, VOCABULARY_ITEM};
pub use pipeline::{ChatReply, ChatRequest, ReplySource, ReplyStream, TutorPipeline, TutorSettings};
pub use roster::{Roster, StudentRecord};
