use rand::Rng;
use std::sync::Arc;

use crate::config::DelayRange;
use crate::error::{MarkingError, Result};
use crate::rubric::store::RubricStore;
use crate::worker::timer::random_delay;

/// Decides whether a rubric line needs correcting.
///
/// This stands in for a marker's judgement; the review protocol does not
/// depend on how the decision is made.
pub trait CorrectionPolicy: Send + Sync {
    fn needs_correction(&self, question: usize, line: &str) -> bool;
}

impl<F> CorrectionPolicy for F
where
    F: Fn(usize, &str) -> bool + Send + Sync,
{
    fn needs_correction(&self, question: usize, line: &str) -> bool {
        self(question, line)
    }
}

/// Flags each reviewed line independently with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomCorrection {
    probability: f64,
}

impl RandomCorrection {
    /// `probability` is clamped to `[0, 1]`; NaN flags nothing.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }
}

impl CorrectionPolicy for RandomCorrection {
    fn needs_correction(&self, _question: usize, _line: &str) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

/// Never flags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl CorrectionPolicy for NoCorrection {
    fn needs_correction(&self, _question: usize, _line: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// No line was flagged.
    Clean,
    /// A flagged line was rewritten and persisted.
    Corrected {
        question: usize,
        before: String,
        after: String,
        version: u64,
    },
    /// The flagged line disappeared or has nothing to correct in the current
    /// text; nothing was written.
    Stale { question: usize },
    /// The correction is visible in memory but could not be persisted.
    PersistFailed { question: usize },
}

/// Non-empty rubric lines, in question order.
pub fn rubric_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|line| !line.is_empty()).collect()
}

/// Join lines back into rubric text, one trailing newline per line.
pub fn rebuild(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

/// Bump the byte two positions after the first comma by one, so `1, A`
/// becomes `1, B`.
///
/// Only printable ASCII (`' '..='~'`) is bumped; `~` becomes DEL. Returns
/// `None` when there is no comma, the line is too short, or the byte is a
/// control character (bumping `\t` would split the line) or part of a
/// multi-byte character.
pub fn correct_line(line: &str) -> Option<String> {
    let target = line.find(',')? + 2;
    let mut bytes = line.as_bytes().to_vec();
    let byte = bytes.get_mut(target)?;
    if !(b' '..=b'~').contains(&*byte) {
        return None;
    }
    *byte += 1;
    String::from_utf8(bytes).ok()
}

/// Runs the optimistic-read, recheck-then-write review of the rubric.
#[derive(Clone)]
pub struct RubricReviewer {
    policy: Arc<dyn CorrectionPolicy>,
    delay: DelayRange,
}

impl RubricReviewer {
    pub fn new(policy: Arc<dyn CorrectionPolicy>, delay: DelayRange) -> Self {
        Self { policy, delay }
    }

    /// Review the rubric line by line and correct the first flagged line.
    ///
    /// The scan runs inside a shared read epoch. The correction takes the
    /// write lock afterwards and re-reads the text, since another marker may
    /// have committed in between.
    pub async fn review(&self, store: &RubricStore, worker: usize) -> Result<ReviewOutcome> {
        let ticket = store.begin_read().await?;
        tracing::debug!(worker, "Reading rubric");
        let text = ticket.text().await;
        let flagged = self.scan(&text, worker).await;
        store.end_read(ticket);

        match flagged {
            Some(question) => self.correct(store, worker, question).await,
            None => Ok(ReviewOutcome::Clean),
        }
    }

    async fn scan(&self, text: &str, worker: usize) -> Option<usize> {
        for (question, line) in rubric_lines(text).into_iter().enumerate() {
            if !self.delay.is_zero() {
                tokio::time::sleep(random_delay(self.delay)).await;
            }
            if self.policy.needs_correction(question, line) {
                tracing::info!(worker, line = question + 1, "Rubric line flagged for correction");
                return Some(question);
            }
        }
        None
    }

    async fn correct(
        &self,
        store: &RubricStore,
        worker: usize,
        question: usize,
    ) -> Result<ReviewOutcome> {
        let ticket = store.begin_write().await?;
        tracing::debug!(worker, line = question + 1, "Acquired rubric write lock");

        let fresh = ticket.text().await;
        let mut lines: Vec<String> = rubric_lines(&fresh).into_iter().map(String::from).collect();
        let Some(corrected) = lines.get(question).and_then(|line| correct_line(line)) else {
            tracing::debug!(worker, line = question + 1, "Flagged rubric line no longer correctable");
            return Ok(ReviewOutcome::Stale { question });
        };
        let before = std::mem::replace(&mut lines[question], corrected.clone());

        match store.commit_write(ticket, rebuild(&lines)).await {
            Ok(version) => {
                tracing::info!(
                    worker,
                    line = question + 1,
                    before = %before,
                    after = %corrected,
                    version,
                    "Rubric corrected"
                );
                Ok(ReviewOutcome::Corrected {
                    question,
                    before,
                    after: corrected,
                    version,
                })
            }
            Err(MarkingError::RubricWrite(_)) => Ok(ReviewOutcome::PersistFailed { question }),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for RubricReviewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RubricReviewer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
