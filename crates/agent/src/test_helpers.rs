//! Shared test helpers for agent tests.

use mercy_core::error::ProviderError;
use mercy_core::message::Message;
use mercy_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted provider does on one call.
#[derive(Clone)]
pub enum Scripted {
    Reply(String),
    Fail(ProviderError),
    /// Sleep, then reply. Used to exercise timeouts and cancellation.
    Slow(Duration, String),
}

/// A mock provider that plays back a script, one step per call.
///
/// Every request is recorded so tests can inspect the composed messages.
pub struct ScriptedProvider {
    script: Mutex<Vec<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Scripted::Reply(text.into())])
    }

    pub fn failing(err: ProviderError) -> Self {
        Self::new(vec![Scripted::Fail(err)])
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
        let step = {
            let mut script = self.script.lock().unwrap();
            assert!(!script.is_empty(), "ScriptedProvider: no more steps");
            script.remove(0)
        };
        self.requests.lock().unwrap().push(request);

        match step {
            Scripted::Reply(text) => Ok(make_text_response(&text)),
            Scripted::Fail(err) => Err(err),
            Scripted::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(make_text_response(&text))
            }
        }
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
        }),
        model: "mock-model".into(),
    }
}
