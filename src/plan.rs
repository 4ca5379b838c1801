//! Planner: turns a goal into an ordered list of sub-tasks.
//!
//! One generation call, one numbered-list parse. The plan's sequence is
//! authoritative; nothing downstream may reorder it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{GenerateError, GenerateOptions, RateLimitedGenerator};

/// Lifecycle of a sub-task within one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One atomic unit of a plan. Created by the planner; status, result and
/// error are mutated in place by the executor as it works through the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub description: String,
    pub status: SubTaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl SubTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            status: SubTaskStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// Errors raised while planning.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The response parsed to zero sub-tasks. Hard failure: execution must
    /// not start on an empty plan.
    #[error("planner produced no sub-tasks for the goal")]
    EmptyPlan,

    #[error(transparent)]
    Generation(#[from] GenerateError),
}

/// Decomposes goals into plans via a single generation call.
pub struct Planner {
    generator: Arc<RateLimitedGenerator>,
}

impl Planner {
    pub fn new(generator: Arc<RateLimitedGenerator>) -> Self {
        Self { generator }
    }

    /// Ask the model for a numbered action list and parse it into sub-tasks.
    ///
    /// # Errors
    /// - [`PlanError::EmptyPlan`] when no line carries an ordinal prefix
    ///   (covers empty, malformed, and sentinel/degraded responses)
    /// - [`PlanError::Generation`] on a permanent backend failure
    pub async fn decompose(&self, goal: &str) -> Result<Vec<SubTask>, PlanError> {
        let prompt = format!(
            "Create a step-by-step plan to achieve this goal: {}. \
             Each step should be a clear action. Return the plan as a numbered list.",
            goal
        );

        let generation = self
            .generator
            .generate(&prompt, &GenerateOptions::default())
            .await?;

        let subtasks: Vec<SubTask> = generation
            .text
            .lines()
            .filter_map(strip_ordinal)
            .map(SubTask::new)
            .collect();

        if subtasks.is_empty() {
            tracing::warn!(goal, "planner response contained no numbered lines");
            return Err(PlanError::EmptyPlan);
        }

        tracing::info!(goal, steps = subtasks.len(), "plan ready");
        Ok(subtasks)
    }
}

/// Strip a leading list ordinal (`3. ` or `3) `) from a line.
///
/// Returns `None` for lines without an ordinal or with nothing after it;
/// those lines are not plan steps.
fn strip_ordinal(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let rest = &trimmed[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockGenerator;
    use crate::llm::{GenerateError, QuotaConfig};

    async fn planner_with(mock: Arc<MockGenerator>) -> Planner {
        let generator = RateLimitedGenerator::connect(
            mock,
            &["test-model".to_string()],
            QuotaConfig {
                min_interval: std::time::Duration::ZERO,
                ..QuotaConfig::default()
            },
        )
        .await
        .unwrap();
        Planner::new(Arc::new(generator))
    }

    #[test]
    fn test_strip_ordinal_forms() {
        assert_eq!(strip_ordinal("1. Book venue"), Some("Book venue"));
        assert_eq!(strip_ordinal("  12) Send invitations  "), Some("Send invitations"));
        assert_eq!(strip_ordinal("3.Order cake"), Some("Order cake"));
        assert_eq!(strip_ordinal("Here is the plan:"), None);
        assert_eq!(strip_ordinal("- bullet item"), None);
        assert_eq!(strip_ordinal("4."), None);
        assert_eq!(strip_ordinal(""), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decompose_preserves_order_and_strips_ordinals() {
        let mock = Arc::new(MockGenerator::new().respond_when(
            "step-by-step plan",
            "Sure, here is a plan:\n1. Book venue\n2. Order cake\n3. Send invitations\n\nGood luck!",
        ));
        let planner = planner_with(mock).await;

        let plan = planner.decompose("Plan a birthday party").await.unwrap();
        let descriptions: Vec<&str> = plan.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Book venue", "Order cake", "Send invitations"]);
        assert!(plan.iter().all(|t| t.status == SubTaskStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decompose_empty_response_is_hard_failure() {
        let mock = Arc::new(
            MockGenerator::new().respond_when("step-by-step plan", "I cannot help with that."),
        );
        let planner = planner_with(mock).await;

        let err = planner.decompose("anything").await.unwrap_err();
        assert!(matches!(err, PlanError::EmptyPlan));
    }

    #[tokio::test(start_paused = true)]
    async fn test_decompose_degraded_sentinel_is_empty_plan() {
        let mock = Arc::new(MockGenerator::new());
        let planner = planner_with(mock.clone()).await;

        // All attempts fail transiently: the limiter degrades, the warning
        // text carries no numbered lines, so planning fails hard.
        mock.script_failures(10, GenerateError::server_error(503, "down"));
        let err = planner.decompose("anything").await.unwrap_err();
        assert!(matches!(err, PlanError::EmptyPlan));
    }
}
