//! Summarizer: synthesizes a final answer from the goal and the ordered
//! execution results. One generation call, no extra retry beyond what the
//! rate limiter already provides.

use std::sync::Arc;

use crate::llm::{GenerateError, GenerateOptions, RateLimitedGenerator};
use crate::plan::SubTask;

pub struct Summarizer {
    generator: Arc<RateLimitedGenerator>,
}

impl Summarizer {
    pub fn new(generator: Arc<RateLimitedGenerator>) -> Self {
        Self { generator }
    }

    /// Combine the goal and every (sub-task, result) pair, in plan order,
    /// into a final answer.
    ///
    /// # Errors
    /// A permanent generation failure here is the overall operation's
    /// failure; there are no partial fallbacks past this point.
    pub async fn summarize(
        &self,
        goal: &str,
        subtasks: &[SubTask],
        results: &[String],
    ) -> Result<String, GenerateError> {
        let mut prompt = format!(
            "Based on the following results, provide a final, comprehensive answer \
             to the user's goal: '{}'.\n\nResults:\n",
            goal
        );
        for (subtask, result) in subtasks.iter().zip(results) {
            prompt.push_str(&format!("- {}: {}\n", subtask.description, result));
        }

        let generation = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;

        // A degraded sentinel is still a usable answer string.
        Ok(generation.text)
    }
}
