use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkingError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Rubric source unavailable: {0}")]
    RubricUnavailable(String),

    #[error("Exam source unavailable: {0}")]
    ExamSourceUnavailable(String),

    #[error("Exam not found: {0}")]
    ExamNotFound(String),

    #[error("Malformed exam {key}: {reason}")]
    MalformedExam { key: String, reason: String },

    #[error("Failed to persist rubric: {0}")]
    RubricWrite(String),

    #[error("Lock closed: {0}")]
    LockClosed(String),

    #[error("Worker task failed: {0}")]
    WorkerJoin(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarkingError {
    /// Errors that abort a run before any worker starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MarkingError::Config(_)
                | MarkingError::RubricUnavailable(_)
                | MarkingError::ExamSourceUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MarkingError>;
