//! Shared test helpers for tutor tests.

use chatptk_core::error::ProviderError;
use chatptk_core::provider::{Completion, Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that replays scripted outcomes and records every request.
///
/// Panics if more calls are made than outcomes provided.
pub struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn texts(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing() -> Self {
        Self::new(vec![Err(ProviderError::ApiError {
            status_code: 503,
            message: "Service Unavailable".into(),
        })])
    }

    /// No outcomes: any call panics.
    pub fn silent() -> Self {
        Self::new(vec![])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let outcome = self.outcomes.lock().unwrap().pop_front();
        let text = match outcome {
            Some(outcome) => outcome?,
            None => panic!("ScriptedProvider: unexpected call #{}", self.call_count()),
        };

        Ok(ProviderResponse {
            completion: Completion {
                text,
                is_truncated: false,
            },
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}
