//! LLM layer: the raw text-generation capability and its resilience wrapper.
//!
//! The backend is a single opaque capability (`TextGenerator`); everything
//! the rest of the crate calls goes through `RateLimitedGenerator`, which
//! adds quota tracking, request spacing, retry with backoff, and candidate
//! model fallback on top of it.

mod error;
mod gemini;
mod limiter;
#[cfg(test)]
pub(crate) mod mock;

pub use error::{classify_http_status, error_from_status, GenerateError, GenerateErrorKind};
pub use gemini::GeminiClient;
pub use limiter::{ConnectError, QuotaConfig, RateLimitedGenerator};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Safety policy forwarded to the backend's content filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SafetyPolicy {
    /// Backend defaults
    #[default]
    Default,
    /// Disable blocking (research/debug use)
    BlockNone,
    /// Block aggressively
    Strict,
}

/// Optional parameters for a generation request.
///
/// A value type: constructed once per request, never shared or mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Sampling temperature in [0, 1]
    pub temperature: Option<f64>,
    /// Maximum output tokens to generate
    pub max_output_tokens: Option<u64>,
    /// Content safety policy
    pub safety_policy: SafetyPolicy,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            max_output_tokens: Some(2000),
            safety_policy: SafetyPolicy::Default,
        }
    }
}

/// Status of a generation outcome.
///
/// Quota exhaustion and retry exhaustion are degraded *values*, not errors:
/// callers receive explanatory text and a sentinel status so they can tell
/// it apart from model content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// The backend produced this text
    Completed,
    /// The daily quota was spent before the call; text is a reset estimate
    QuotaExhausted,
    /// Retries were exhausted on transient failures; text is a warning
    Degraded,
}

/// Outcome of a call through [`RateLimitedGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub status: GenerationStatus,
}

impl Generation {
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: GenerationStatus::Completed,
        }
    }

    pub fn quota_exhausted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: GenerationStatus::QuotaExhausted,
        }
    }

    pub fn degraded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            status: GenerationStatus::Degraded,
        }
    }

    /// Whether this outcome carries real model content.
    pub fn is_content(&self) -> bool {
        self.status == GenerationStatus::Completed
    }
}

/// Trait for raw text-generation backends.
///
/// The model is a call argument (not client state) so one client can serve
/// the whole fallback candidate chain.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt against a specific model.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, GenerateError>;
}
