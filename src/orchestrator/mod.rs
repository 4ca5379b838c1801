//! Concurrent task-queue entry point over the same primitives as
//! [`crate::agent::GoalAgent`].
//!
//! Tasks are submitted against registered agents, queued by priority
//! (FIFO within a priority), and run by a single polling scheduling loop
//! that bounds how many are in flight at once. Completion and error hooks
//! observe terminal transitions; hook failures are logged and swallowed so
//! they can never take the loop down.

mod task;

pub use task::{Task, TaskError, TaskId, TaskStatus, MAX_PRIORITY, MIN_PRIORITY};

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Processing capability a task is bound to. `context` carries the results
/// of recently completed tasks, oldest first.
#[async_trait]
pub trait TaskAgent: Send + Sync {
    async fn process(&self, description: &str, context: &[String]) -> anyhow::Result<String>;
}

/// Hook observing a task's terminal transition. Receives a snapshot; an
/// `Err` is logged and swallowed.
pub type TaskHook = Box<dyn Fn(&Task) -> anyhow::Result<()> + Send + Sync>;

/// Tuning for the scheduling loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on concurrently running tasks
    pub max_concurrent_tasks: usize,
    /// Sleep between scheduling cycles when no work was started
    pub idle_poll: Duration,
    /// How many recent completed results feed the next task's context
    pub context_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            idle_poll: Duration::from_millis(100),
            context_window: 10,
        }
    }
}

/// Errors from the orchestrator's public surface.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no agent registered under '{0}'")]
    UnknownAgent(String),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Per-agent task counts, by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Queue entry: highest priority first, FIFO within a priority.
#[derive(Debug, PartialEq, Eq)]
struct QueueEntry {
    priority: u8,
    seq: u64,
    id: TaskId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: larger priority wins, then the smaller (earlier) seq.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    config: OrchestratorConfig,
    agents: RwLock<HashMap<String, Arc<dyn TaskAgent>>>,
    /// Task registry; mutated only by submit, execute, and cancel_all.
    tasks: RwLock<HashMap<TaskId, Task>>,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    in_flight: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    completion_hooks: RwLock<Vec<TaskHook>>,
    error_hooks: RwLock<Vec<TaskHook>>,
    running: AtomicBool,
    next_seq: AtomicU64,
}

/// Priority task queue with a bounded in-flight set and a single polling
/// scheduling loop.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

impl TaskOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                agents: RwLock::new(HashMap::new()),
                tasks: RwLock::new(HashMap::new()),
                queue: Mutex::new(BinaryHeap::new()),
                in_flight: Mutex::new(HashMap::new()),
                completion_hooks: RwLock::new(Vec::new()),
                error_hooks: RwLock::new(Vec::new()),
                running: AtomicBool::new(false),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Register an agent under a unique name. Re-registering a name
    /// replaces the agent; queued tasks bound to it pick up the new one.
    pub async fn register_agent(&self, name: impl Into<String>, agent: Arc<dyn TaskAgent>) {
        let name = name.into();
        tracing::info!(agent = %name, "registered agent");
        self.inner.agents.write().await.insert(name, agent);
    }

    /// Observe successful terminal transitions.
    pub async fn on_completion(&self, hook: TaskHook) {
        self.inner.completion_hooks.write().await.push(hook);
    }

    /// Observe failed terminal transitions.
    pub async fn on_error(&self, hook: TaskHook) {
        self.inner.error_hooks.write().await.push(hook);
    }

    /// Queue a task for a registered agent.
    ///
    /// # Errors
    /// - [`OrchestratorError::UnknownAgent`] for an unregistered agent name
    /// - [`OrchestratorError::Task`] for an empty description or a priority
    ///   outside 1-10
    pub async fn submit(
        &self,
        description: impl Into<String>,
        agent: &str,
        priority: u8,
    ) -> Result<TaskId, OrchestratorError> {
        if !self.inner.agents.read().await.contains_key(agent) {
            return Err(OrchestratorError::UnknownAgent(agent.to_string()));
        }

        let task = Task::new(description, agent, priority)?;
        let id = task.id();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);

        self.inner.tasks.write().await.insert(id, task);
        self.inner.queue.lock().await.push(QueueEntry { priority, seq, id });

        tracing::info!(task = %id, agent, priority, "task submitted");
        Ok(id)
    }

    /// The scheduling loop. Runs until [`Self::cancel_all`] flips the
    /// running flag; sleeps `idle_poll` between cycles that started no work.
    pub async fn run(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
        tracing::info!(
            max_concurrent = self.inner.config.max_concurrent_tasks,
            "orchestrator loop started"
        );

        while self.inner.running.load(Ordering::SeqCst) {
            self.retire_finished().await;

            let started = self.start_next_if_capacity().await;
            if !started {
                tokio::time::sleep(self.inner.config.idle_poll).await;
            }
        }

        tracing::info!("orchestrator loop stopped");
    }

    /// Drop finished handles out of the in-flight set.
    async fn retire_finished(&self) {
        let mut in_flight = self.inner.in_flight.lock().await;
        in_flight.retain(|_, handle| !handle.is_finished());
    }

    /// Pop and launch the highest-priority queued task if the in-flight set
    /// has capacity. Returns whether a task was started.
    async fn start_next_if_capacity(&self) -> bool {
        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight.len() >= self.inner.config.max_concurrent_tasks {
            return false;
        }

        let entry = {
            let mut queue = self.inner.queue.lock().await;
            queue.pop()
        };
        let Some(entry) = entry else {
            return false;
        };

        // Tasks cancelled while queued are skipped, not launched.
        {
            let tasks = self.inner.tasks.read().await;
            match tasks.get(&entry.id) {
                Some(task) if *task.status() == TaskStatus::Pending => {}
                _ => return true,
            }
        }

        let inner = self.inner.clone();
        let id = entry.id;
        let handle = tokio::spawn(async move {
            Inner::execute(inner, id).await;
        });
        in_flight.insert(id, handle);
        true
    }

    /// Stop the loop and request cancellation of everything queued or in
    /// flight. Cooperative: already-started work stops at its next yield
    /// point, not instantly.
    pub async fn cancel_all(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        let handles: Vec<(TaskId, JoinHandle<()>)> =
            self.inner.in_flight.lock().await.drain().collect();
        for (_, handle) in &handles {
            handle.abort();
        }

        let queued: Vec<QueueEntry> = {
            let mut queue = self.inner.queue.lock().await;
            std::mem::take(&mut *queue).into_sorted_vec()
        };

        let mut tasks = self.inner.tasks.write().await;
        for (id, _) in handles {
            if let Some(task) = tasks.get_mut(&id) {
                // Terminal tasks won the race; leave them be.
                let _ = task.cancel();
            }
        }
        for entry in queued {
            if let Some(task) = tasks.get_mut(&entry.id) {
                let _ = task.cancel();
            }
        }

        tracing::info!("cancellation requested for all tasks");
    }

    /// Submit one description to several agents at once and wait for every
    /// resulting task to finish. Returns each agent's result, or its failure
    /// reason as the error string. An empty `agents` slice targets every
    /// registered agent; unregistered names are skipped. The scheduling loop
    /// must be running or this never returns.
    ///
    /// # Errors
    /// [`OrchestratorError::Task`] for an empty description or a priority
    /// outside 1-10.
    pub async fn broadcast(
        &self,
        description: &str,
        agents: &[String],
        priority: u8,
    ) -> Result<HashMap<String, Result<String, String>>, OrchestratorError> {
        let targets: Vec<String> = {
            let registered = self.inner.agents.read().await;
            if agents.is_empty() {
                registered.keys().cloned().collect()
            } else {
                agents
                    .iter()
                    .filter(|name| registered.contains_key(*name))
                    .cloned()
                    .collect()
            }
        };

        let mut submitted = Vec::with_capacity(targets.len());
        for agent in targets {
            let id = self.submit(description, &agent, priority).await?;
            submitted.push((agent, id));
        }
        tracing::info!(targets = submitted.len(), "broadcast submitted");

        let mut outcomes = HashMap::with_capacity(submitted.len());
        for (agent, id) in submitted {
            let task = self.wait_terminal(id).await;
            let outcome = match task.status() {
                TaskStatus::Completed => Ok(task.result().unwrap_or_default().to_string()),
                TaskStatus::Failed { reason } => Err(reason.clone()),
                _ => Err("cancelled before completion".to_string()),
            };
            outcomes.insert(agent, outcome);
        }
        Ok(outcomes)
    }

    /// Poll a known task until it reaches a terminal state.
    async fn wait_terminal(&self, id: TaskId) -> Task {
        loop {
            if let Some(task) = self.task_status(id).await {
                if task.status().is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(self.inner.config.idle_poll).await;
        }
    }

    /// Snapshot of a task, if known.
    pub async fn task_status(&self, id: TaskId) -> Option<Task> {
        self.inner.tasks.read().await.get(&id).cloned()
    }

    /// Per-agent task counts by status.
    pub async fn agent_stats(&self) -> HashMap<String, AgentStats> {
        let agents = self.inner.agents.read().await;
        let tasks = self.inner.tasks.read().await;

        let mut stats: HashMap<String, AgentStats> = agents
            .keys()
            .map(|name| (name.clone(), AgentStats::default()))
            .collect();

        for task in tasks.values() {
            let entry = stats.entry(task.agent().to_string()).or_default();
            entry.total += 1;
            match task.status() {
                TaskStatus::Pending => entry.pending += 1,
                TaskStatus::Running => entry.running += 1,
                TaskStatus::Completed => entry.completed += 1,
                TaskStatus::Failed { .. } => entry.failed += 1,
                TaskStatus::Cancelled => entry.cancelled += 1,
            }
        }

        stats
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Run one task to a terminal state. Spawned by the scheduling loop.
    async fn execute(inner: Arc<Inner>, id: TaskId) {
        let (description, agent_name) = {
            let mut tasks = inner.tasks.write().await;
            let Some(task) = tasks.get_mut(&id) else {
                tracing::warn!(task = %id, "task vanished before execution");
                return;
            };
            if let Err(e) = task.start() {
                // Cancelled between pop and launch; nothing to do.
                tracing::debug!(task = %id, error = %e, "task not startable");
                return;
            }
            (task.description().to_string(), task.agent().to_string())
        };

        let agent = inner.agents.read().await.get(&agent_name).cloned();
        let context = inner.recent_results().await;

        let outcome = match agent {
            Some(agent) => agent.process(&description, &context).await,
            None => Err(anyhow::anyhow!("agent '{}' is no longer registered", agent_name)),
        };

        let snapshot = {
            let mut tasks = inner.tasks.write().await;
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            let transition = match outcome {
                Ok(result) => {
                    tracing::info!(task = %id, "task completed");
                    task.complete(result)
                }
                Err(e) => {
                    tracing::warn!(task = %id, error = %e, "task failed");
                    task.fail(format!("{:#}", e))
                }
            };
            if let Err(e) = transition {
                // Raced with cancel_all; the terminal state stands.
                tracing::debug!(task = %id, error = %e, "terminal transition skipped");
                return;
            }
            task.clone()
        };

        let hooks = if matches!(snapshot.status(), TaskStatus::Completed) {
            inner.completion_hooks.read().await
        } else {
            inner.error_hooks.read().await
        };
        for hook in hooks.iter() {
            if let Err(e) = hook(&snapshot) {
                tracing::error!(task = %id, error = %e, "task hook failed; ignoring");
            }
        }
    }

    /// Results of the most recently completed tasks, oldest first.
    async fn recent_results(&self) -> Vec<String> {
        let tasks = self.tasks.read().await;
        let mut completed: Vec<&Task> = tasks
            .values()
            .filter(|t| matches!(t.status(), TaskStatus::Completed))
            .collect();
        completed.sort_by_key(|t| t.completed_at());

        completed
            .iter()
            .rev()
            .take(self.config.context_window)
            .rev()
            .filter_map(|t| t.result().map(String::from))
            .collect()
    }
}
