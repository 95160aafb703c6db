//! Shared helpers for marking integration tests.
//!
//! Provides fast configurations, in-memory sources and a bounded way to run
//! a whole session.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ta_marking::config::{DelayRange, MarkingConfig};
use ta_marking::exam::{ExamId, ExamPayload, ExamSlot, MemoryExamSource};
use ta_marking::report::RunReport;
use ta_marking::rubric::{CorrectionPolicy, MemoryRubricSource, RubricStore};
use ta_marking::MarkingSession;

/// Upper bound for any full run in these tests.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration with near-zero delays so runs finish in milliseconds
pub fn fast_config(workers: usize) -> MarkingConfig {
    MarkingConfig::new(workers)
        .with_review_delay(DelayRange::ZERO)
        .with_marking_delay(DelayRange::new(1, 3))
        .with_idle_backoff_ms(1)
        .with_loop_pause_ms(0)
        .with_correction_probability(0.0)
}

pub fn payload(student: u32, questions: usize) -> ExamPayload {
    ExamPayload {
        student: ExamId(student),
        question_count: questions,
        content: format!("{:04}\n", student),
    }
}

pub fn slot(student: u32, questions: usize) -> Arc<ExamSlot> {
    Arc::new(ExamSlot::new(
        format!("exam_{:04}.txt", student),
        payload(student, questions),
    ))
}

pub fn memory_rubric_store(text: &str) -> (Arc<RubricStore>, Arc<MemoryRubricSource>) {
    let source = Arc::new(MemoryRubricSource::new(text));
    let store = Arc::new(RubricStore::new(text, source.clone()));
    (store, source)
}

/// Policy that flags the first line on every review.
pub fn always_first_line() -> Arc<dyn CorrectionPolicy> {
    Arc::new(|question: usize, _: &str| question == 0)
}

/// Handles to the in-memory sources behind a test session.
pub struct TestSession {
    pub session: MarkingSession,
    pub exams: Arc<MemoryExamSource>,
    pub rubric: Arc<MemoryRubricSource>,
}

pub async fn open_session(
    exams: MemoryExamSource,
    rubric_lines: usize,
    config: MarkingConfig,
) -> TestSession {
    let exams = Arc::new(exams);
    let rubric = Arc::new(MemoryRubricSource::with_lines(rubric_lines));
    let session = MarkingSession::open(config, exams.clone(), rubric.clone())
        .await
        .expect("session should open");
    TestSession {
        session,
        exams,
        rubric,
    }
}

/// Run a session to completion, failing the test if it does not stop.
pub async fn run_to_completion(session: MarkingSession) -> RunReport {
    tokio::time::timeout(RUN_TIMEOUT, session.run())
        .await
        .expect("markers should stop before the timeout")
        .expect("run should succeed")
}
