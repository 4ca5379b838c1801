//! taskpilot - CLI entry point.
//!
//! Runs one goal through the plan-execute-summarize chain and prints the
//! structured report.

use std::sync::Arc;

use taskpilot::config::Config;
use taskpilot::llm::{GeminiClient, RateLimitedGenerator};
use taskpilot::memory::ActionLog;
use taskpilot::tools::{Tool, ToolRouter};
use taskpilot::GoalAgent;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Demo tool: a stubbed web search, matched by the word "search" in a
/// sub-task description.
struct StubSearch;

#[async_trait::async_trait]
impl Tool for StubSearch {
    async fn invoke(&self, args: &str) -> anyhow::Result<String> {
        Ok(format!("Search results for '{}'...", args))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskpilot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let goal: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if goal.trim().is_empty() {
        anyhow::bail!("usage: taskpilot <goal>");
    }

    let config = Config::from_env()?;
    info!(candidates = ?config.model_candidates, "loaded configuration");

    let backend = Arc::new(GeminiClient::new(config.api_key.clone()));
    let generator = Arc::new(
        RateLimitedGenerator::connect(backend, &config.model_candidates, config.quota.clone())
            .await?,
    );
    info!(model = generator.active_model(), "backend ready");

    let mut router = ToolRouter::new();
    router.register("search", Arc::new(StubSearch))?;

    let agent = GoalAgent::new(generator, router).with_log(ActionLog::new(&config.log_file));
    let report = agent.submit_goal(&goal).await?;

    println!("My plan:");
    for (i, subtask) in report.plan.iter().enumerate() {
        println!("  {}. {}", i + 1, subtask.description);
    }
    println!("\nExecution results:");
    for (subtask, result) in report.plan.iter().zip(&report.results) {
        println!("  {}: {}", subtask.description, result);
    }
    println!("\nFinal answer:\n{}", report.final_answer);

    Ok(())
}
