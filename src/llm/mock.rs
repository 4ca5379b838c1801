//! Scripted mock backend for tests. No network.
//!
//! Responds from substring-matched rules with an echo default, records every
//! call (model, prompt, instant), and can be scripted to fail: either the
//! first N calls (retry paths) or specific models (fallback paths).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{GenerateError, GenerateOptions, TextGenerator};

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

#[derive(Default)]
struct Inner {
    rules: Vec<(String, String)>,
    model_errors: HashMap<String, GenerateError>,
    fail_remaining: u32,
    scripted_error: Option<GenerateError>,
    calls: Vec<RecordedCall>,
}

/// Mock `TextGenerator` with scripted responses.
#[derive(Default)]
pub struct MockGenerator {
    inner: Mutex<Inner>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` when the prompt contains `needle`.
    /// Rules are checked in insertion order; the default is `done: <prompt>`.
    pub fn respond_when(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.inner
            .lock()
            .unwrap()
            .rules
            .push((needle.into(), response.into()));
        self
    }

    /// Fail the next `n` calls, scripted after construction (so probe calls
    /// made during `connect` are unaffected).
    pub fn script_failures(&self, n: u32, error: GenerateError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_remaining = n;
        inner.scripted_error = Some(error);
    }

    /// Always fail calls against `model` with `error`.
    pub fn refuse_model(self, model: impl Into<String>, error: GenerateError) -> Self {
        self.inner
            .lock()
            .unwrap()
            .model_errors
            .insert(model.into(), error);
        self
    }

    /// Snapshot of all recorded calls, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> Result<String, GenerateError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            model: model.to_string(),
            prompt: prompt.to_string(),
            at: Instant::now(),
        });

        if let Some(err) = inner.model_errors.get(model) {
            return Err(err.clone());
        }

        if inner.fail_remaining > 0 {
            inner.fail_remaining -= 1;
            let err = inner
                .scripted_error
                .clone()
                .unwrap_or_else(|| GenerateError::server_error(503, "scripted failure"));
            return Err(err);
        }

        let response = inner
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| format!("done: {}", prompt));

        Ok(response)
    }
}
