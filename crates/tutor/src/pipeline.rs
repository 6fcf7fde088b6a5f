//! The tutor pipeline — decides, per message, who answers.
//!
//! Order of evaluation:
//!
//! 1. **Static responder** — identity, meta-topic, casual greeting
//! 2. **Record lookup** — balance / name from the student roster
//! 3. **Validation** — empty messages stop here
//! 4. **Compose** — persona + mode, recap from session state, lesson knowledge
//! 5. **Complete** — one upstream call, apology on failure
//! 6. **Track** — remember the tutor's new question (quiz modes only)
//!
//! Steps 4–6 run while holding the session's lock, so turns on the same
//! session never interleave.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use chatptk_core::error::ValidationError;
use chatptk_core::message::Message;
use chatptk_core::session::{SessionGuard, SessionId, SessionState, SessionStore};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::completion::{APOLOGY, CompletionGateway, Fragment, FragmentStream};
use crate::lessons::LessonBook;
use crate::mode::TutorMode;
use crate::roster::Roster;
use crate::{composer, responder, tracker};

/// An incoming chat message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub mode: TutorMode,
    /// Falls back to the configured default student when absent
    pub student_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, mode: TutorMode) -> Self {
        Self {
            message: message.into(),
            mode,
            student_id: None,
        }
    }

    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }
}

/// Which stage produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Static,
    Record,
    Model,
    Apology,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    pub source: ReplySource,
}

/// Streamed reply text, fragment by fragment.
pub type ReplyStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Per-deployment knobs.
#[derive(Debug, Clone)]
pub struct TutorSettings {
    pub default_student_id: String,
    pub temperatures: HashMap<TutorMode, f32>,
}

impl TutorSettings {
    pub fn from_config(config: &chatptk_config::AppConfig) -> Self {
        let temperatures = config
            .tutor
            .temperatures
            .iter()
            .filter_map(|(name, temperature)| match TutorMode::parse(Some(name)) {
                TutorMode::Unknown if !name.eq_ignore_ascii_case("unknown") => {
                    warn!(mode = %name, "Ignoring temperature for unrecognized mode");
                    None
                }
                mode => Some((mode, *temperature)),
            })
            .collect();

        Self {
            default_student_id: config.tutor.default_student_id.clone(),
            temperatures,
        }
    }

    /// Configured temperature for `mode`, else the mode's default.
    pub fn temperature(&self, mode: TutorMode) -> f32 {
        self.temperatures
            .get(&mode)
            .copied()
            .unwrap_or_else(|| mode.default_temperature())
    }
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self::from_config(&chatptk_config::AppConfig::default())
    }
}

/// The request interception and prompt-composition pipeline.
pub struct TutorPipeline {
    gateway: CompletionGateway,
    sessions: Arc<dyn SessionStore>,
    roster: Arc<Roster>,
    lessons: Arc<LessonBook>,
    settings: TutorSettings,
}

impl TutorPipeline {
    /// Create a pipeline with empty tables and default settings.
    pub fn new(gateway: CompletionGateway, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            gateway,
            sessions,
            roster: Arc::new(Roster::default()),
            lessons: Arc::new(LessonBook::default()),
            settings: TutorSettings::default(),
        }
    }

    /// Build the pipeline described by `config`, loading the data files.
    pub fn from_config(
        config: &chatptk_config::AppConfig,
        provider: Arc<dyn chatptk_core::provider::Provider>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let gateway =
            CompletionGateway::new(provider, config.model.clone()).with_max_tokens(config.max_tokens);

        Self::new(gateway, sessions)
            .with_roster(Arc::new(Roster::load(&config.data.students_path)))
            .with_lessons(Arc::new(LessonBook::load(&config.data.lessons_path)))
            .with_settings(TutorSettings::from_config(config))
    }

    pub fn with_roster(mut self, roster: Arc<Roster>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_lessons(mut self, lessons: Arc<LessonBook>) -> Self {
        self.lessons = lessons;
        self
    }

    pub fn with_settings(mut self, settings: TutorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn lessons(&self) -> &LessonBook {
        &self.lessons
    }

    /// Answer locally if a static rule or the roster can.
    ///
    /// At most one of the two fires; the static responder wins.
    pub fn intercept(&self, request: &ChatRequest) -> Option<ChatReply> {
        if let Some(rule) = responder::check_rule(&request.message) {
            debug!(rule = rule.name, "Static responder matched");
            return Some(ChatReply {
                text: rule.response.to_string(),
                source: ReplySource::Static,
            });
        }

        let student_id = request
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.settings.default_student_id.as_str());

        self.roster
            .lookup(student_id, &request.message)
            .map(|text| {
                debug!(student_id = %student_id, "Record lookup matched");
                ChatReply {
                    text,
                    source: ReplySource::Record,
                }
            })
    }

    /// Handle one message and return the whole reply.
    pub async fn chat(
        &self,
        session_id: &SessionId,
        request: &ChatRequest,
    ) -> Result<ChatReply, ValidationError> {
        if let Some(reply) = self.intercept(request) {
            info!(session = %session_id, source = ?reply.source, "Answered locally");
            return Ok(reply);
        }
        validate(request)?;

        let mut guard = self.sessions.acquire(session_id).await;
        let messages = self.prepare(request, &mut guard);
        let temperature = self.settings.temperature(request.mode);

        info!(session = %session_id, mode = %request.mode, "Delegating to completion service");
        match self.gateway.complete(messages, temperature).await {
            Ok(completion) => {
                record_turn(&mut guard, request.mode, &completion.text);
                Ok(ChatReply {
                    text: completion.text,
                    source: ReplySource::Model,
                })
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "Completion failed, sending apology");
                Ok(ChatReply {
                    text: APOLOGY.to_string(),
                    source: ReplySource::Apology,
                })
            }
        }
    }

    /// Handle one message and stream the reply as it is generated.
    ///
    /// The session stays locked until the stream finishes or is dropped.
    /// A stream dropped early leaves the session state unchanged.
    pub async fn stream(
        &self,
        session_id: &SessionId,
        request: &ChatRequest,
    ) -> Result<ReplyStream, ValidationError> {
        if let Some(reply) = self.intercept(request) {
            info!(session = %session_id, source = ?reply.source, "Answered locally (stream)");
            return Ok(Box::pin(futures::stream::iter([reply.text])));
        }
        validate(request)?;

        let mut guard = self.sessions.acquire(session_id).await;
        let messages = self.prepare(request, &mut guard);
        let temperature = self.settings.temperature(request.mode);

        info!(session = %session_id, mode = %request.mode, "Streaming from completion service");
        let fragments = self.gateway.stream(messages, temperature).await;

        Ok(tracked(StreamTurn {
            fragments,
            guard,
            mode: request.mode,
            reply: String::new(),
            failed: false,
        }))
    }

    /// Compose the upstream turn, creating session state on first use.
    fn prepare(&self, request: &ChatRequest, slot: &mut Option<SessionState>) -> Vec<Message> {
        let knowledge = self.lessons.relevant(&request.message);
        let session = match request.mode.fallback_item() {
            Some(item) if request.mode.tracks_turns() => Some(&*slot.get_or_insert_with(|| {
                SessionState::new(item.question, item.answer)
            })),
            _ => None,
        };
        composer::compose(request.mode, &request.message, session, &knowledge)
    }
}

fn validate(request: &ChatRequest) -> Result<(), ValidationError> {
    if request.message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(())
}

/// Run the turn tracker for quiz modes.
fn record_turn(slot: &mut Option<SessionState>, mode: TutorMode, reply: &str) {
    if !mode.tracks_turns() {
        return;
    }
    if let Some(state) = slot.as_mut() {
        let fallback = mode.fallback_item().map(|item| item.answer);
        tracker::update(state, reply, fallback);
    }
}

/// A streaming turn in flight.
struct StreamTurn {
    fragments: FragmentStream,
    guard: SessionGuard,
    mode: TutorMode,
    reply: String,
    failed: bool,
}

impl StreamTurn {
    fn finish(mut self) {
        if self.failed {
            return;
        }
        record_turn(&mut self.guard, self.mode, &self.reply);
    }
}

fn tracked(turn: StreamTurn) -> ReplyStream {
    Box::pin(futures::stream::unfold(turn, |mut turn| async move {
        match turn.fragments.next().await {
            Some(Fragment::Text(text)) => {
                turn.reply.push_str(&text);
                Some((text, turn))
            }
            Some(Fragment::Apology) => {
                turn.failed = true;
                Some((APOLOGY.to_string(), turn))
            }
            None => {
                turn.finish();
                None
            }
        }
    }))
}
