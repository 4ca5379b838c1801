//! Rate-limited generation wrapper: daily quota, request spacing, retry with
//! backoff, and candidate model fallback.
//!
//! This is the only path the rest of the crate uses to reach the backend.
//! Quota exhaustion and retry exhaustion come back as sentinel
//! [`Generation`] values rather than errors; only permanent backend
//! failures surface as `Err`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{GenerateError, GenerateOptions, Generation, SafetyPolicy, TextGenerator};

/// Trivial prompt used to probe candidate models at construction.
const SMOKE_TEST_PROMPT: &str = "Reply with the word OK.";

/// Quota and retry policy for the wrapper.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Requests allowed per UTC day
    pub daily_limit: u32,
    /// Minimum spacing between backend requests
    pub min_interval: Duration,
    /// Retries allowed per call on transient failures
    pub max_retries: u32,
    /// Backoff unit; attempt N sleeps N times this
    pub retry_base_delay: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 1500,
            min_interval: Duration::from_secs(1),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// Errors raised while selecting an initial model.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Credential problem: aborts initialization, no fallback.
    #[error("authorization rejected while probing '{model}': {source}")]
    AuthRejected {
        model: String,
        #[source]
        source: GenerateError,
    },

    /// Every candidate failed its probe.
    #[error("no usable model among candidates: {tried:?}")]
    NoUsableModel { tried: Vec<String> },

    #[error("no candidate models configured")]
    NoCandidates,
}

/// Mutable quota bookkeeping. Owned exclusively by the wrapper; all access
/// goes through one mutex so concurrent callers cannot overrun the quota or
/// the spacing ceiling.
#[derive(Debug)]
struct QuotaState {
    requests_used_today: u32,
    window_day: NaiveDate,
    last_request_at: Option<Instant>,
}

impl QuotaState {
    fn new(today: NaiveDate) -> Self {
        Self {
            requests_used_today: 0,
            window_day: today,
            last_request_at: None,
        }
    }

    /// Lazy day-boundary reset: checked on each call, no background timer.
    fn roll_window(&mut self, today: NaiveDate) {
        if today != self.window_day {
            self.window_day = today;
            self.requests_used_today = 0;
        }
    }
}

/// Text generation with throttling, quota tracking, retry, and model
/// fallback layered over a raw [`TextGenerator`] backend.
pub struct RateLimitedGenerator {
    backend: Arc<dyn TextGenerator>,
    model: String,
    config: QuotaConfig,
    state: Mutex<QuotaState>,
}

impl std::fmt::Debug for RateLimitedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedGenerator")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateLimitedGenerator {
    /// Probe `candidates` in order and wrap the backend around the first
    /// model that answers a smoke-test prompt.
    ///
    /// # Errors
    /// - [`ConnectError::AuthRejected`] on a 401/403-class probe failure
    ///   (credential problem; trying other models would not help)
    /// - [`ConnectError::NoUsableModel`] when every candidate fails
    /// - [`ConnectError::NoCandidates`] for an empty candidate list
    pub async fn connect(
        backend: Arc<dyn TextGenerator>,
        candidates: &[String],
        config: QuotaConfig,
    ) -> Result<Self, ConnectError> {
        if candidates.is_empty() {
            return Err(ConnectError::NoCandidates);
        }

        let probe_options = GenerateOptions {
            temperature: Some(0.0),
            max_output_tokens: Some(8),
            safety_policy: SafetyPolicy::Default,
        };

        for model in candidates {
            match backend.generate(model, SMOKE_TEST_PROMPT, &probe_options).await {
                Ok(_) => {
                    tracing::info!(model, "model probe succeeded, selecting as active");
                    // The probe was a backend request; spacing applies from it.
                    let mut state = QuotaState::new(Utc::now().date_naive());
                    state.last_request_at = Some(Instant::now());
                    return Ok(Self {
                        backend,
                        model: model.clone(),
                        config,
                        state: Mutex::new(state),
                    });
                }
                Err(error) if error.kind == super::GenerateErrorKind::AuthRejected => {
                    tracing::error!(model, %error, "authorization rejected, aborting");
                    return Err(ConnectError::AuthRejected {
                        model: model.clone(),
                        source: error,
                    });
                }
                Err(error) => {
                    tracing::warn!(model, %error, "model probe failed, trying next candidate");
                }
            }
        }

        Err(ConnectError::NoUsableModel {
            tried: candidates.to_vec(),
        })
    }

    /// The model selected at construction.
    pub fn active_model(&self) -> &str {
        &self.model
    }

    /// Generate text for `prompt`.
    ///
    /// Holds the quota mutex for the whole call, including the cooldown and
    /// backoff sleeps: concurrent callers are serialized on purpose so the
    /// external per-second ceiling holds across all of them.
    ///
    /// # Errors
    /// Only permanent backend failures (auth, malformed request, parse).
    /// Quota exhaustion and spent retries return sentinel [`Generation`]s.
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Generation, GenerateError> {
        let mut state = self.state.lock().await;
        state.roll_window(Utc::now().date_naive());

        // Pre-flight: reject before touching the backend, counter untouched.
        if state.requests_used_today >= self.config.daily_limit {
            let resets_on = state
                .window_day
                .succ_opt()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "tomorrow".to_string());
            return Ok(Generation::quota_exhausted(format!(
                "Daily request limit of {} reached; quota resets at 00:00 UTC on {}",
                self.config.daily_limit, resets_on
            )));
        }

        let mut attempt: u32 = 0;
        loop {
            // Spacing relative to the previously issued request, retries
            // included.
            if let Some(last) = state.last_request_at {
                let elapsed = last.elapsed();
                if elapsed < self.config.min_interval {
                    tokio::time::sleep(self.config.min_interval - elapsed).await;
                }
            }
            state.last_request_at = Some(Instant::now());

            match self.backend.generate(&self.model, prompt, options).await {
                Ok(text) => {
                    state.requests_used_today += 1;
                    if attempt > 0 {
                        tracing::info!(attempt, "generation succeeded after retries");
                    }
                    return Ok(Generation::completed(text));
                }
                Err(error) if error.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let backoff = self.config.retry_base_delay * attempt;
                    // A backend-supplied Retry-After can lengthen the wait,
                    // never shorten it.
                    let delay = error.retry_after.map_or(backoff, |ra| ra.max(backoff));
                    tracing::warn!(
                        attempt,
                        ?delay,
                        %error,
                        "transient generation failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(
                        retries = self.config.max_retries,
                        %error,
                        "retries exhausted, returning degraded response"
                    );
                    return Ok(Generation::degraded(format!(
                        "Generation unavailable after {} retries ({}); try again later",
                        self.config.max_retries, error
                    )));
                }
                Err(error) => {
                    tracing::error!(%error, "permanent generation failure");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockGenerator;
    use crate::llm::GenerationStatus;

    fn test_config() -> QuotaConfig {
        QuotaConfig {
            daily_limit: 100,
            min_interval: Duration::from_secs(1),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    async fn connect_mock(
        mock: Arc<MockGenerator>,
        config: QuotaConfig,
    ) -> RateLimitedGenerator {
        RateLimitedGenerator::connect(mock, &["test-model".to_string()], config)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_spaced_by_min_interval() {
        let mock = Arc::new(MockGenerator::new());
        let limiter = connect_mock(mock.clone(), test_config()).await;

        for _ in 0..3 {
            limiter
                .generate("hello", &GenerateOptions::default())
                .await
                .unwrap();
        }

        let calls = mock.calls();
        // probe + 3 generation calls
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_spacing_window() {
        let mock = Arc::new(MockGenerator::new());
        let limiter = Arc::new(connect_mock(mock.clone(), test_config()).await);

        // Two callers race; the state lock serializes them, so the spacing
        // ceiling holds across both.
        let first = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.generate("first", &GenerateOptions::default()).await
            })
        };
        let second = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter.generate("second", &GenerateOptions::default()).await
            })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let calls = mock.calls();
        // probe + one call per caller
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exhaustion_returns_sentinel() {
        let mock = Arc::new(MockGenerator::new());
        let config = QuotaConfig {
            daily_limit: 2,
            ..test_config()
        };
        let limiter = connect_mock(mock.clone(), config).await;

        for _ in 0..2 {
            let gen = limiter
                .generate("hello", &GenerateOptions::default())
                .await
                .unwrap();
            assert_eq!(gen.status, GenerationStatus::Completed);
        }
        let before = mock.call_count();

        // At the limit: sentinel, no backend call, counter frozen.
        for _ in 0..3 {
            let gen = limiter
                .generate("hello", &GenerateOptions::default())
                .await
                .unwrap();
            assert_eq!(gen.status, GenerationStatus::QuotaExhausted);
            assert!(gen.text.contains("Daily request limit of 2"));
        }
        assert_eq!(mock.call_count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_then_succeed() {
        let mock = Arc::new(MockGenerator::new());
        let limiter = connect_mock(mock.clone(), test_config()).await;

        mock.script_failures(2, GenerateError::rate_limited("slow down", None));
        let gen = limiter
            .generate("hello", &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(gen.status, GenerationStatus::Completed);
        assert_eq!(gen.text, "done: hello");
        // probe + 2 failures + 1 success
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_degrades_without_error() {
        let mock = Arc::new(MockGenerator::new());
        let config = QuotaConfig {
            max_retries: 2,
            ..test_config()
        };
        let limiter = connect_mock(mock.clone(), config).await;

        mock.script_failures(10, GenerateError::server_error(503, "overloaded"));
        let gen = limiter
            .generate("hello", &GenerateOptions::default())
            .await
            .unwrap();

        assert_eq!(gen.status, GenerationStatus::Degraded);
        assert!(gen.text.contains("after 2 retries"));
        // probe + initial attempt + 2 retries
        assert_eq!(mock.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_propagates_without_retry() {
        let mock = Arc::new(MockGenerator::new());
        let limiter = connect_mock(mock.clone(), test_config()).await;
        let before = mock.call_count();

        mock.script_failures(1, GenerateError::invalid_request(400, "bad prompt"));
        let err = limiter
            .generate("hello", &GenerateOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, crate::llm::GenerateErrorKind::InvalidRequest);
        assert_eq!(mock.call_count(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_to_second_candidate() {
        let mock = Arc::new(
            MockGenerator::new()
                .refuse_model("dead-model", GenerateError::model_not_found("no such model")),
        );
        let candidates = vec!["dead-model".to_string(), "alive-model".to_string()];
        let limiter = RateLimitedGenerator::connect(mock, &candidates, test_config())
            .await
            .unwrap();

        assert_eq!(limiter.active_model(), "alive-model");
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_rejection_aborts_initialization() {
        let mock = Arc::new(
            MockGenerator::new()
                .refuse_model("locked-model", GenerateError::auth_rejected(401, "bad key")),
        );
        let candidates = vec!["locked-model".to_string(), "alive-model".to_string()];
        let err = RateLimitedGenerator::connect(mock, &candidates, test_config())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::AuthRejected { ref model, .. } if model == "locked-model"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_candidates_failing_is_fatal() {
        let mock = Arc::new(
            MockGenerator::new()
                .refuse_model("a", GenerateError::model_not_found("nope"))
                .refuse_model("b", GenerateError::server_error(500, "down")),
        );
        let candidates = vec!["a".to_string(), "b".to_string()];
        let err = RateLimitedGenerator::connect(mock, &candidates, test_config())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::NoUsableModel { ref tried } if tried.len() == 2));
    }

    #[test]
    fn test_day_boundary_resets_counter() {
        let day1 = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();

        let mut state = QuotaState::new(day1);
        state.requests_used_today = 42;

        state.roll_window(day1);
        assert_eq!(state.requests_used_today, 42);

        state.roll_window(day2);
        assert_eq!(state.requests_used_today, 0);
        assert_eq!(state.window_day, day2);
    }
}
