use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::{MarkingError, Result};

/// Durable home of the rubric text.
#[async_trait]
pub trait RubricSource: Send + Sync {
    async fn read(&self) -> Result<String>;

    /// Replace the stored rubric with `text`.
    async fn write(&self, text: &str) -> Result<()>;
}

/// Rubric kept in a single text file.
#[derive(Debug, Clone)]
pub struct FileRubricSource {
    path: PathBuf,
}

impl FileRubricSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RubricSource for FileRubricSource {
    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MarkingError::RubricUnavailable(format!("{}: {}", self.path.display(), e)))
    }

    async fn write(&self, text: &str) -> Result<()> {
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| MarkingError::RubricWrite(format!("{}: {}", self.path.display(), e)))
    }
}

#[derive(Debug)]
struct MemoryRubric {
    text: String,
    history: Vec<String>,
}

/// In-process rubric that records every successful write.
#[derive(Debug)]
pub struct MemoryRubricSource {
    state: Mutex<MemoryRubric>,
    fail_writes: AtomicBool,
}

impl MemoryRubricSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryRubric {
                text: text.into(),
                history: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Build a rubric of `lines` lines shaped like `1, A`.
    pub fn with_lines(lines: usize) -> Self {
        Self::new(sample_rubric(lines))
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every text written so far, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.state.lock().await.history.clone()
    }

    pub async fn current(&self) -> String {
        self.state.lock().await.text.clone()
    }
}

#[async_trait]
impl RubricSource for MemoryRubricSource {
    async fn read(&self) -> Result<String> {
        Ok(self.state.lock().await.text.clone())
    }

    async fn write(&self, text: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MarkingError::RubricWrite("writes disabled".to_string()));
        }
        let mut state = self.state.lock().await;
        state.text = text.to_string();
        state.history.push(text.to_string());
        Ok(())
    }
}

/// `1, A\n2, B\n...`: one line per question, each with an editable grade
/// letter two bytes after the comma.
pub fn sample_rubric(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("{}, {}\n", i + 1, (b'A' + (i % 26) as u8) as char))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_rubric_shape() {
        assert_eq!(sample_rubric(3), "1, A\n2, B\n3, C\n");
        assert_eq!(sample_rubric(0), "");
    }

    #[tokio::test]
    async fn memory_source_records_writes() {
        let source = MemoryRubricSource::with_lines(2);
        source.write("1, B\n2, B\n").await.unwrap();
        assert_eq!(source.read().await.unwrap(), "1, B\n2, B\n");
        assert_eq!(source.history().await, vec!["1, B\n2, B\n".to_string()]);
    }

    #[tokio::test]
    async fn memory_source_write_failure_keeps_text() {
        let source = MemoryRubricSource::new("1, A\n");
        source.set_fail_writes(true);
        let err = source.write("1, B\n").await.unwrap_err();
        assert!(matches!(err, MarkingError::RubricWrite(_)));
        assert_eq!(source.current().await, "1, A\n");
        assert!(source.history().await.is_empty());
    }
}
