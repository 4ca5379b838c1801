//! Configuration management for taskpilot.
//!
//! Configuration is set via environment variables:
//! - `GEMINI_API_KEY` - Required. API key for the generation backend.
//! - `MODEL_CANDIDATES` - Optional. Comma-separated model fallback chain.
//!   Defaults to `gemini-1.5-flash,gemini-1.5-pro`.
//! - `DAILY_REQUEST_LIMIT` - Optional. Requests allowed per UTC day. Defaults to `1500`.
//! - `MIN_REQUEST_INTERVAL_MS` - Optional. Spacing between requests. Defaults to `1000`.
//! - `MAX_RETRIES` - Optional. Retries per call on transient failures. Defaults to `3`.
//! - `RETRY_BASE_DELAY_MS` - Optional. Linear backoff unit. Defaults to `2000`.
//! - `MAX_CONCURRENT_TASKS` - Optional. Orchestrator in-flight bound. Defaults to `5`.
//! - `AGENT_LOG_FILE` - Optional. Action log path. Defaults to `agent_log.txt`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::QuotaConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API key
    pub api_key: String,

    /// Model fallback chain, probed in order at startup
    pub model_candidates: Vec<String>,

    /// Quota and retry policy for the rate limiter
    pub quota: QuotaConfig,

    /// Orchestrator in-flight bound
    pub max_concurrent_tasks: usize,

    /// Append-only action log path
    pub log_file: PathBuf,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set,
    /// `ConfigError::InvalidValue` for unparseable numeric settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let model_candidates: Vec<String> = std::env::var("MODEL_CANDIDATES")
            .unwrap_or_else(|_| "gemini-1.5-flash,gemini-1.5-pro".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let quota = QuotaConfig {
            daily_limit: env_parsed("DAILY_REQUEST_LIMIT", 1500u32)?,
            min_interval: Duration::from_millis(env_parsed("MIN_REQUEST_INTERVAL_MS", 1000u64)?),
            max_retries: env_parsed("MAX_RETRIES", 3u32)?,
            retry_base_delay: Duration::from_millis(env_parsed("RETRY_BASE_DELAY_MS", 2000u64)?),
        };

        let max_concurrent_tasks = env_parsed("MAX_CONCURRENT_TASKS", 5usize)?;

        let log_file = std::env::var("AGENT_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("agent_log.txt"));

        Ok(Self {
            api_key,
            model_candidates,
            quota,
            max_concurrent_tasks,
            log_file,
        })
    }
}
