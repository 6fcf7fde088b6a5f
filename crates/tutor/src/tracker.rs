//! Turn tracker. Remembers the question the tutor just asked.
//!
//! The heuristic takes the last line of the reply that ends in `?`.
//! When the reply has no such line the previous question is kept; this is
//! the known failure mode, not an error.

use chatptk_core::session::SessionState;

/// Last line of `reply` whose trimmed text ends with `?`, trimmed.
pub fn extract_question(reply: &str) -> Option<&str> {
    reply
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.ends_with('?'))
}

/// Record the reply's question in `state`.
///
/// `fallback_answer`, when given, replaces `expected_answer`; the answer is
/// never derived from the reply itself.
pub fn update(state: &mut SessionState, reply: &str, fallback_answer: Option<&str>) {
    if let Some(question) = extract_question(reply) {
        state.last_question = Some(question.to_string());
    }
    if let Some(answer) = fallback_answer {
        state.expected_answer = Some(answer.to_string());
    }
}
