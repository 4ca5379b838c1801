//! Append-only action log.
//!
//! One `[YYYY-MM-DD HH:MM:SS] message` line per entry, for the human
//! operator reading the file. Nothing in the crate reads it back.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

/// Timestamped append-only text log.
#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append a timestamped entry.
    ///
    /// # Errors
    /// IO failures only. Callers on the goal path use [`Self::record`]
    /// instead, which swallows them.
    pub async fn append(&self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}\n", timestamp, message);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    /// Append an entry, logging and swallowing IO failures: a broken log
    /// file must not fail the goal chain.
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.append(message).await {
            tracing::warn!(path = %self.path.display(), error = %e, "could not append to action log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_writes_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActionLog::new(dir.path().join("agent_log.txt"));

        log.append("Goal: plan a party").await.unwrap();
        log.append("Executed task 'Book venue'").await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join("agent_log.txt"))
            .await
            .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("Goal: plan a party"));
        // [YYYY-MM-DD HH:MM:SS] prefix is 21 chars
        assert_eq!(&lines[1][21..], " Executed task 'Book venue'");
    }

    #[tokio::test]
    async fn test_record_swallows_io_errors() {
        // Directory path: the open fails, record must not panic.
        let dir = tempfile::tempdir().unwrap();
        let log = ActionLog::new(dir.path());
        log.record("goes nowhere").await;
    }
}
