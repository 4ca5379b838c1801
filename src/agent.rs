//! GoalAgent: the synchronous plan-execute-summarize chain.
//!
//! This is the public surface for one-shot goals: a goal string in, a
//! structured report (or structured error) out. Expected failure classes
//! (empty plan, quota, generation errors) never escape as panics.

use std::sync::Arc;

use serde::Serialize;

use crate::executor::Executor;
use crate::llm::{GenerateError, RateLimitedGenerator};
use crate::memory::ActionLog;
use crate::plan::{PlanError, Planner, SubTask};
use crate::summarizer::Summarizer;
use crate::tools::ToolRouter;

/// Structured outcome of a processed goal.
#[derive(Debug, Clone, Serialize)]
pub struct GoalReport {
    pub goal: String,
    pub plan: Vec<SubTask>,
    pub results: Vec<String>,
    pub final_answer: String,
}

/// Structured failure of a processed goal.
#[derive(Debug, thiserror::Error)]
pub enum GoalError {
    /// Planning failed; no partial results exist.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The final synthesis call failed permanently.
    #[error("summary generation failed: {0}")]
    Summary(#[from] GenerateError),
}

/// One-goal-at-a-time agent: decompose, execute in order, summarize.
pub struct GoalAgent {
    planner: Planner,
    executor: Executor,
    summarizer: Summarizer,
    log: Option<ActionLog>,
}

impl GoalAgent {
    pub fn new(generator: Arc<RateLimitedGenerator>, router: ToolRouter) -> Self {
        Self {
            planner: Planner::new(generator.clone()),
            executor: Executor::new(generator.clone(), router),
            summarizer: Summarizer::new(generator),
            log: None,
        }
    }

    /// Attach an append-only action log.
    pub fn with_log(mut self, log: ActionLog) -> Self {
        self.log = Some(log);
        self
    }

    async fn record(&self, message: &str) {
        if let Some(log) = &self.log {
            log.record(message).await;
        }
    }

    /// Process one goal end to end.
    ///
    /// # Errors
    /// - [`GoalError::Plan`] when decomposition yields no sub-tasks or fails
    ///   permanently (execution never starts)
    /// - [`GoalError::Summary`] when the synthesis call fails permanently
    pub async fn submit_goal(&self, goal: &str) -> Result<GoalReport, GoalError> {
        tracing::info!(goal, "processing goal");

        let mut plan = self.planner.decompose(goal).await?;
        let steps: Vec<&str> = plan.iter().map(|t| t.description.as_str()).collect();
        self.record(&format!("Goal: '{}' planned with {} steps: {:?}", goal, steps.len(), steps))
            .await;

        let results = self.executor.run(&mut plan).await;
        for (subtask, result) in plan.iter().zip(&results) {
            self.record(&format!("Executed task '{}': {}", subtask.description, result))
                .await;
        }

        let final_answer = self.summarizer.summarize(goal, &plan, &results).await?;
        self.record(&format!("Final response generated: {}", final_answer))
            .await;

        tracing::info!(goal, steps = plan.len(), "goal completed");
        Ok(GoalReport {
            goal: goal.to_string(),
            plan,
            results,
            final_answer,
        })
    }
}
