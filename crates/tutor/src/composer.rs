//! Prompt composer: builds the system and user turn sent upstream.

use chatptk_core::message::Message;
use chatptk_core::session::SessionState;

use crate::mode::TutorMode;

/// Persona shared by every mode.
pub const BASE_PERSONA: &str = "You are ChatPTK, a friendly and patient English tutor for PTK students.\n\
     Use simple, encouraging language and keep answers short.\n\
     Use the provided knowledge if it is relevant.\n\
     Never say you are an AI model and never mention which company or model powers you.";

/// Build the two-message turn for `message`.
///
/// When `session` carries both a previous question and an expected answer,
/// the user turn is a recap asking the model to grade the answer and pose
/// the next question. Otherwise the raw message is sent. Matched lesson
/// `knowledge` is prepended to the user turn when non-empty.
pub fn compose(
    mode: TutorMode,
    message: &str,
    session: Option<&SessionState>,
    knowledge: &str,
) -> Vec<Message> {
    vec![
        Message::system(system_prompt(mode)),
        Message::user(user_turn(message, session, knowledge)),
    ]
}

/// Base persona plus the mode's instructions.
pub fn system_prompt(mode: TutorMode) -> String {
    let fragment = mode.instructions();
    if fragment.is_empty() {
        BASE_PERSONA.to_string()
    } else {
        format!("{BASE_PERSONA}\n\n{fragment}")
    }
}

fn user_turn(message: &str, session: Option<&SessionState>, knowledge: &str) -> String {
    let recap = session.and_then(|s| {
        let question = s.last_question.as_deref()?;
        let expected = s.expected_answer.as_deref()?;
        Some(format!(
            "Previous question: {question}\n\
             Expected answer: {expected}\n\
             Student answer: {message}\n\n\
             Tell the student whether their answer is correct and briefly explain why. \
             Then ask the next question on its own line, ending with a question mark."
        ))
    });
    let turn = recap.unwrap_or_else(|| message.to_string());

    if knowledge.trim().is_empty() {
        turn
    } else {
        format!("{knowledge}\n\n{turn}")
    }
}
