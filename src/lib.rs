//! # taskpilot
//!
//! A minimal plan-execute-summarize agent runtime with rate-limited LLM
//! access.
//!
//! ## Architecture
//!
//! ```text
//!   goal ──▶ Planner ──▶ [sub-tasks] ──▶ Executor ──▶ Summarizer ──▶ answer
//!               │                           │              │
//!               │                      ToolRouter          │
//!               │                       (or model)         │
//!               ▼                           ▼              ▼
//!         ┌────────────────────────────────────────────────────┐
//!         │              RateLimitedGenerator                  │
//!         │  quota · spacing · retry/backoff · model fallback  │
//!         └───────────────────────┬────────────────────────────┘
//!                                 ▼
//!                          TextGenerator
//! ```
//!
//! Two entry points share these primitives:
//! - [`agent::GoalAgent`]: the synchronous chain above, one goal at a time
//! - [`orchestrator::TaskOrchestrator`]: a concurrent priority task queue
//!   with a bounded in-flight set and lifecycle tracking
//!
//! ## Modules
//! - `llm`: generation capability, error taxonomy, resilience wrapper
//! - `plan`: goal decomposition into ordered sub-tasks
//! - `tools`: named tool capabilities and the substring router
//! - `executor`: best-effort sequential plan execution
//! - `summarizer`: final answer synthesis
//! - `agent`: the one-shot goal surface
//! - `orchestrator`: the concurrent task-queue surface
//! - `memory`: append-only action log

pub mod agent;
pub mod config;
pub mod executor;
pub mod llm;
pub mod memory;
pub mod orchestrator;
pub mod plan;
pub mod summarizer;
pub mod tools;

pub use agent::{GoalAgent, GoalError, GoalReport};
pub use config::Config;
