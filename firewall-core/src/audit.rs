//! Durable persistence for profile mutations, backed by a daily-rotated
//! JSONL file. [`ProfilePersistence::save`] is fire-and-forget by contract,
//! so [`JsonlProfileSink`] spawns the write and returns immediately rather
//! than making the decider wait on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::adapters::ProfilePersistence;

/// Appends one JSON record per save to `{base_dir}/profiles-YYYYMMDD.jsonl`.
pub struct JsonlProfileSink {
    base_dir: PathBuf,
    current_file: Mutex<Option<(String, PathBuf)>>,
}

impl JsonlProfileSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            current_file: Mutex::new(None),
        }
    }

    fn file_for_today(&self) -> PathBuf {
        let today = Local::now().format("%Y%m%d").to_string();
        let mut current = self.current_file.lock().unwrap();
        if let Some((date, path)) = current.as_ref() {
            if date == &today {
                return path.clone();
            }
        }
        let path = self.base_dir.join(format!("profiles-{today}.jsonl"));
        *current = Some((today, path.clone()));
        path
    }

    async fn append(path: &Path, record: serde_json::Value) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        let mut line = serde_json::to_string(&record).unwrap_or_default();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

impl ProfilePersistence for JsonlProfileSink {
    fn save(&self, profile_name: &str, reason: &str) {
        let path = self.file_for_today();
        let record = serde_json::json!({
            "profile": profile_name,
            "reason": reason,
            "saved_at": Local::now().to_rfc3339(),
        });
        tokio::spawn(async move {
            if let Err(err) = Self::append(&path, record).await {
                tracing::warn!(error = %err, path = %path.display(), "failed to persist profile change");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_appends_a_jsonl_record() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlProfileSink::new(dir.path());
        sink.save("pid 42", "user permitted example.com.");
        // save() only spawns the write; give the task a turn to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let today = Local::now().format("%Y%m%d").to_string();
        let path = dir.path().join(format!("profiles-{today}.jsonl"));
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("pid 42"));
        assert!(contents.contains("user permitted example.com."));
    }

    #[test]
    fn file_for_today_is_stable_within_the_same_day() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlProfileSink::new(dir.path());
        assert_eq!(sink.file_for_today(), sink.file_for_today());
    }
}
