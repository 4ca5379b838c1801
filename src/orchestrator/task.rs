//! Orchestrated task type and its lifecycle state machine.
//!
//! # State Machine
//! ```text
//! Pending -> Running -> Completed
//!                   \-> Failed
//!        \-> Cancelled (from any non-terminal state)
//! ```
//! Terminal states are final; no transition leaves them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest and highest accepted priorities (higher runs first).
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

/// Unique identifier for an orchestrated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue
    Pending,
    /// Currently in flight
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed { reason: String },
    /// Cancelled before reaching a terminal outcome
    Cancelled,
}

impl TaskStatus {
    /// `true` for Completed, Failed, or Cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Cancelled
        )
    }

    /// `true` for Pending or Running.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

/// A unit of work bound to a named agent, managed by the orchestrator.
///
/// # Invariants
/// - `priority` stays within `MIN_PRIORITY..=MAX_PRIORITY`
/// - status only changes through the explicit transition methods
/// - `started_at`/`completed_at` are stamped exactly when the matching
///   transition happens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    description: String,
    /// Name of the registered agent this task is bound to
    agent: String,
    /// 1-10, higher runs first
    priority: u8,
    status: TaskStatus,
    result: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a Pending task.
    ///
    /// # Errors
    /// Rejects empty descriptions and out-of-range priorities.
    pub fn new(
        description: impl Into<String>,
        agent: impl Into<String>,
        priority: u8,
    ) -> Result<Self, TaskError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(TaskError::EmptyDescription);
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(TaskError::PriorityOutOfRange(priority));
        }

        Ok(Self {
            id: TaskId::new(),
            description,
            agent: agent.into(),
            priority,
            status: TaskStatus::Pending,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn status(&self) -> &TaskStatus {
        &self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    // State transitions - explicit and validated

    /// Pending → Running; stamps `started_at`.
    pub fn start(&mut self) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            other => Err(TaskError::InvalidTransition {
                from: format!("{:?}", other),
                to: "Running".to_string(),
            }),
        }
    }

    /// Running → Completed; stores the result, stamps `completed_at`.
    pub fn complete(&mut self, result: String) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Completed;
                self.result = Some(result);
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(TaskError::InvalidTransition {
                from: format!("{:?}", other),
                to: "Completed".to_string(),
            }),
        }
    }

    /// Running → Failed; stamps `completed_at`.
    pub fn fail(&mut self, reason: String) -> Result<(), TaskError> {
        match &self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Failed { reason };
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            other => Err(TaskError::InvalidTransition {
                from: format!("{:?}", other),
                to: "Failed".to_string(),
            }),
        }
    }

    /// Any active state → Cancelled; stamps `completed_at`.
    pub fn cancel(&mut self) -> Result<(), TaskError> {
        if self.status.is_active() {
            self.status = TaskStatus::Cancelled;
            self.completed_at = Some(Utc::now());
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: "Cancelled".to_string(),
            })
        }
    }
}

/// Errors from task construction and transitions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("Task description cannot be empty")]
    EmptyDescription,

    #[error("Task priority {0} is outside 1-10")]
    PriorityOutOfRange(u8),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        let mut task = Task::new("do the thing", "worker", 5).unwrap();
        assert_eq!(*task.status(), TaskStatus::Pending);
        assert!(task.started_at().is_none());

        task.start().unwrap();
        assert_eq!(*task.status(), TaskStatus::Running);
        assert!(task.started_at().is_some());

        task.complete("it is done".to_string()).unwrap();
        assert_eq!(*task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some("it is done"));
        assert!(task.completed_at().is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut task = Task::new("do the thing", "worker", 5).unwrap();
        task.start().unwrap();
        task.fail("backend gone".to_string()).unwrap();

        assert!(task.status().is_terminal());
        assert!(task.start().is_err());
        assert!(task.complete("late".to_string()).is_err());
        assert!(task.cancel().is_err());
        assert!(matches!(task.status(), TaskStatus::Failed { reason } if reason == "backend gone"));
    }

    #[test]
    fn test_cancel_from_pending_and_running() {
        let mut pending = Task::new("a", "worker", 1).unwrap();
        pending.cancel().unwrap();
        assert_eq!(*pending.status(), TaskStatus::Cancelled);

        let mut running = Task::new("b", "worker", 10).unwrap();
        running.start().unwrap();
        running.cancel().unwrap();
        assert_eq!(*running.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn test_construction_validation() {
        assert!(matches!(
            Task::new("  ", "worker", 5),
            Err(TaskError::EmptyDescription)
        ));
        assert!(matches!(
            Task::new("x", "worker", 0),
            Err(TaskError::PriorityOutOfRange(0))
        ));
        assert!(matches!(
            Task::new("x", "worker", 11),
            Err(TaskError::PriorityOutOfRange(11))
        ));
        assert!(Task::new("x", "worker", 1).is_ok());
        assert!(Task::new("x", "worker", 10).is_ok());
    }
}
