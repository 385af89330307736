//! Durable error log for failures that escape a pipeline run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct ErrorJournal {
    path: PathBuf,
}

impl ErrorJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats one journal line: `[<RFC 3339>] ERROR: <message>`.
    pub fn line(at: DateTime<Utc>, message: &str) -> String {
        format!(
            "[{}] ERROR: {}\n",
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            message.replace('\n', " ")
        )
    }

    pub async fn append(&self, message: &str) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(Self::line(Utc::now(), message).as_bytes())
            .await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn line_format() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            ErrorJournal::line(at, "boom\ncaused by: io"),
            "[2025-01-02T03:04:05Z] ERROR: boom caused by: io\n"
        );
    }

    #[tokio::test]
    async fn appends_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let journal = ErrorJournal::new(dir.path().join("error.log"));
        journal.append("first").await.unwrap();
        journal.append("second").await.unwrap();

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("ERROR: first"));
        assert!(lines[1].ends_with("ERROR: second"));
    }
}
