use std::time::Duration;

use crate::error::{MarkingError, Result};
use crate::exam::ExamId;

/// Fewer markers than this cannot exercise any coordination.
pub const MIN_WORKERS: usize = 2;

/// Student number of the exam that marks the end of the pile.
pub const DEFAULT_SENTINEL: ExamId = ExamId(9999);

pub const DEFAULT_QUESTIONS_PER_EXAM: usize = 5;

/// Inclusive range of a simulated delay, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange::new(0, 0);

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Configuration of one marking run.
///
/// Delays model human work: each rubric line takes `review_delay` to
/// inspect and each question takes `marking_delay` to mark. Neither is
/// ever slept while an exclusive lock is held.
#[derive(Debug, Clone)]
pub struct MarkingConfig {
    /// Number of concurrent markers.
    pub workers: usize,
    /// Student number that signals the end of the exam pile.
    pub sentinel: ExamId,
    /// Question count used when an exam header does not declare one.
    pub questions_per_exam: usize,
    pub review_delay: DelayRange,
    pub marking_delay: DelayRange,
    /// Sleep when no question could be claimed or loaded.
    pub idle_backoff_ms: u64,
    /// Pause between two iterations of a marker loop.
    pub loop_pause_ms: u64,
    /// Chance that a reviewed rubric line is flagged for correction.
    pub correction_probability: f64,
}

impl Default for MarkingConfig {
    fn default() -> Self {
        Self {
            workers: MIN_WORKERS,
            sentinel: DEFAULT_SENTINEL,
            questions_per_exam: DEFAULT_QUESTIONS_PER_EXAM,
            review_delay: DelayRange::new(500, 1000),
            marking_delay: DelayRange::new(1000, 2000),
            idle_backoff_ms: 100,
            loop_pause_ms: 50,
            correction_probability: 0.3,
        }
    }
}

impl MarkingConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_sentinel(mut self, sentinel: ExamId) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn with_questions_per_exam(mut self, questions: usize) -> Self {
        self.questions_per_exam = questions;
        self
    }

    pub fn with_review_delay(mut self, delay: DelayRange) -> Self {
        self.review_delay = delay;
        self
    }

    pub fn with_marking_delay(mut self, delay: DelayRange) -> Self {
        self.marking_delay = delay;
        self
    }

    pub fn with_idle_backoff_ms(mut self, ms: u64) -> Self {
        self.idle_backoff_ms = ms;
        self
    }

    pub fn with_loop_pause_ms(mut self, ms: u64) -> Self {
        self.loop_pause_ms = ms;
        self
    }

    pub fn with_correction_probability(mut self, probability: f64) -> Self {
        self.correction_probability = probability;
        self
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.workers < MIN_WORKERS {
            return Err(MarkingError::Config(format!(
                "at least {} workers are required, got {}",
                MIN_WORKERS, self.workers
            )));
        }
        if self.questions_per_exam == 0 {
            return Err(MarkingError::Config(
                "questions per exam must be at least 1".to_string(),
            ));
        }
        for (name, range) in [
            ("review", self.review_delay),
            ("marking", self.marking_delay),
        ] {
            if range.min_ms > range.max_ms {
                return Err(MarkingError::Config(format!(
                    "{} delay minimum {}ms exceeds maximum {}ms",
                    name, range.min_ms, range.max_ms
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.correction_probability) {
            return Err(MarkingError::Config(format!(
                "correction probability must be within [0, 1], got {}",
                self.correction_probability
            )));
        }
        Ok(())
    }
}
