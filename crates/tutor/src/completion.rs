//! Completion gateway. The only place that talks to the provider.
//!
//! Upstream failures stop here. Single-shot callers get an
//! [`UpstreamError`] to replace with [`APOLOGY`]; streaming callers get a
//! fragment stream that ends with one apology fragment on failure.

use chatptk_core::error::ProviderError;
use chatptk_core::message::Message;
use chatptk_core::provider::{ChunkReceiver, Completion, Provider, ProviderRequest};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Shown to the student whenever the completion service fails.
pub const APOLOGY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment. 🙏";

/// The completion service could not produce a reply.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Completion contained no text")]
    EmptyCompletion,
}

/// One piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    /// The stream failed; always the last fragment.
    Apology,
}

impl Fragment {
    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Text(text) => text,
            Fragment::Apology => APOLOGY,
        }
    }
}

/// Lazy, finite stream of reply fragments. Dropping it cancels the upstream call.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Sends composed turns to the configured model.
pub struct CompletionGateway {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: Option<u32>,
}

impl CompletionGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: None,
        }
    }

    /// Cap the tokens generated per reply.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn request(&self, messages: Vec<Message>, temperature: f32, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    /// One request, full text of the first choice.
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
    ) -> Result<Completion, UpstreamError> {
        debug!(provider = %self.provider.name(), model = %self.model, temperature, "Requesting completion");

        let response = self
            .provider
            .complete(self.request(messages, temperature, false))
            .await?;

        if response.completion.text.trim().is_empty() {
            return Err(UpstreamError::EmptyCompletion);
        }
        if response.completion.is_truncated {
            debug!(model = %response.model, "Completion hit the token limit");
        }
        Ok(response.completion)
    }

    /// Streaming request. Never fails: errors become a final [`Fragment::Apology`].
    pub async fn stream(&self, messages: Vec<Message>, temperature: f32) -> FragmentStream {
        debug!(provider = %self.provider.name(), model = %self.model, temperature, "Requesting streamed completion");

        match self
            .provider
            .stream(self.request(messages, temperature, true))
            .await
        {
            Ok(rx) => fragments(rx),
            Err(e) => {
                warn!(error = %e, "Streaming request failed before the first fragment");
                Box::pin(futures::stream::iter([Fragment::Apology]))
            }
        }
    }
}

/// Adapt a chunk channel into fragments, skipping empty deltas.
///
/// A stream that closes before any text arrived counts as a failure.
fn fragments(rx: ChunkReceiver) -> FragmentStream {
    Box::pin(futures::stream::unfold(Some((rx, false)), |state| async move {
        let (mut rx, mut any_text) = state?;
        loop {
            match rx.recv().await {
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.content.filter(|c| !c.is_empty()) {
                        any_text = true;
                        return Some((Fragment::Text(text), Some((rx, any_text))));
                    }
                    if chunk.done {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Stream failed mid-reply");
                    return Some((Fragment::Apology, None));
                }
                None => break,
            }
        }
        if any_text {
            None
        } else {
            warn!(error = %UpstreamError::EmptyCompletion, "Stream ended without text");
            Some((Fragment::Apology, None))
        }
    }))
}
