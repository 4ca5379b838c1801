//! Executor: works through a plan sequentially, best-effort.
//!
//! Every sub-task either hits a routed tool or falls back to direct
//! generation. Failures are folded into that sub-task's result text and the
//! loop keeps going: one bad step must not sink the whole plan.

use std::sync::Arc;

use crate::llm::{GenerateOptions, RateLimitedGenerator};
use crate::plan::{SubTask, SubTaskStatus};
use crate::tools::ToolRouter;

pub struct Executor {
    generator: Arc<RateLimitedGenerator>,
    router: ToolRouter,
}

impl Executor {
    pub fn new(generator: Arc<RateLimitedGenerator>, router: ToolRouter) -> Self {
        Self { generator, router }
    }

    /// Execute every sub-task in plan order, mutating status/result/error in
    /// place. Returns exactly one result string per sub-task; failed steps
    /// carry their error message as the result.
    pub async fn run(&self, subtasks: &mut [SubTask]) -> Vec<String> {
        let mut results = Vec::with_capacity(subtasks.len());

        for (index, subtask) in subtasks.iter_mut().enumerate() {
            subtask.status = SubTaskStatus::Running;

            let outcome = match self.router.route(&subtask.description) {
                Some(hit) => {
                    tracing::debug!(step = index + 1, tool = %hit.name, "routing to tool");
                    hit.tool
                        .invoke(&subtask.description)
                        .await
                        .map_err(|e| format!("tool '{}' failed: {:#}", hit.name, e))
                }
                None => {
                    tracing::debug!(step = index + 1, "no tool matched, delegating to model");
                    self.generator
                        .generate(&subtask.description, &GenerateOptions::default())
                        .await
                        .map(|generation| generation.text)
                        .map_err(|e| format!("generation failed: {}", e))
                }
            };

            let text = match outcome {
                Ok(text) => {
                    subtask.error = None;
                    text
                }
                Err(message) => {
                    tracing::warn!(step = index + 1, error = %message, "sub-task failed, continuing");
                    subtask.error = Some(message.clone());
                    format!("Error executing sub-task: {}", message)
                }
            };

            // Completed even when the result documents an error: the step
            // was attempted and produced a usable (if degraded) result.
            subtask.result = Some(text.clone());
            subtask.status = SubTaskStatus::Completed;
            results.push(text);
        }

        results
    }
}
