use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::exam::{ExamId, ExamPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Active,
    Exhausted,
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Active => write!(f, "active"),
            SlotState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Shared grading progress of one exam.
///
/// The marked flags live behind the slot's own lock. The completed count is
/// only written while that lock is held, but is stored atomically so that
/// the work pool can scan slots without taking any of their locks.
#[derive(Debug)]
pub struct ExamSlot {
    key: String,
    student: ExamId,
    content: String,
    question_count: usize,
    marked: Mutex<Vec<bool>>,
    completed: AtomicUsize,
}

impl ExamSlot {
    pub fn new(key: impl Into<String>, payload: ExamPayload) -> Self {
        Self {
            key: key.into(),
            student: payload.student,
            content: payload.content,
            question_count: payload.question_count,
            marked: Mutex::new(vec![false; payload.question_count]),
            completed: AtomicUsize::new(0),
        }
    }

    /// Source identifier this exam was loaded from
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn student(&self) -> ExamId {
        self.student
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Number of questions whose marking has finished.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_exhausted(&self) -> bool {
        self.completed() >= self.question_count
    }

    pub fn state(&self) -> SlotState {
        if self.is_exhausted() {
            SlotState::Exhausted
        } else {
            SlotState::Active
        }
    }

    /// Reserve the lowest-numbered unmarked question.
    ///
    /// Returns `None` once every question has been claimed, even if some
    /// claimed questions are still being marked.
    pub async fn claim_question(&self) -> Option<usize> {
        let mut marked = self.marked.lock().await;
        let question = marked.iter().position(|done| !done)?;
        marked[question] = true;
        Some(question)
    }

    /// Record that a claimed question has been marked. Returns the new
    /// completed count.
    pub async fn complete_question(&self, question: usize) -> usize {
        let marked = self.marked.lock().await;
        let completed = self.completed.load(Ordering::Acquire);

        if !marked.get(question).copied().unwrap_or(false) {
            tracing::error!(
                student = %self.student,
                question,
                "Completion reported for a question that was never claimed"
            );
            return completed;
        }
        if completed >= self.question_count {
            tracing::error!(
                student = %self.student,
                question,
                completed,
                "Completion reported on an exhausted exam"
            );
            return completed;
        }

        self.completed.store(completed + 1, Ordering::Release);
        completed + 1
    }

    /// Copy of the marked flags, in question order.
    pub async fn marked_flags(&self) -> Vec<bool> {
        self.marked.lock().await.clone()
    }
}
