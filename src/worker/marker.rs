use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MarkingConfig;
use crate::exam::{ExamSlot, ExamSource};
use crate::rubric::{ReviewOutcome, RubricReviewer, RubricStore};
use crate::scheduler::{LoadOutcome, TerminationSignal, WorkPool};
use crate::worker::timer::random_delay;

/// Shared containers handed to every marker at spawn time.
#[derive(Clone)]
pub struct MarkerContext {
    pub config: Arc<MarkingConfig>,
    pub rubric: Arc<RubricStore>,
    pub reviewer: RubricReviewer,
    pub pool: Arc<WorkPool>,
    pub exams: Arc<dyn ExamSource>,
    pub termination: TerminationSignal,
}

/// What one marker did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerStats {
    pub worker: usize,
    pub iterations: u64,
    pub questions_marked: u64,
    pub rubric_corrections: u64,
    pub persist_failures: u64,
    pub exams_loaded: u64,
    pub load_failures: u64,
}

impl MarkerStats {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }
}

/// Result of one attempt to find and mark a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seek {
    Marked,
    /// Nothing could be claimed right now.
    Idle,
    /// Termination was raised while looking for work.
    Stopping,
}

/// One marker: reviews the rubric, then claims and marks one question, until
/// the termination signal is raised.
pub struct Marker {
    id: usize,
    ctx: MarkerContext,
}

impl Marker {
    pub fn new(id: usize, ctx: MarkerContext) -> Self {
        Self { id, ctx }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Marker loop.
    ///
    /// Each iteration:
    /// 1. Stops if the termination signal is raised
    /// 2. Reviews the rubric, correcting at most one line
    /// 3. Claims and marks one question, loading exams as needed
    /// 4. Backs off when nothing could be claimed
    ///
    /// Termination is only checked at the top of the loop, so a question
    /// that has been claimed is always finished.
    pub async fn run(self) -> MarkerStats {
        let mut stats = MarkerStats::new(self.id);
        tracing::info!(worker = self.id, "Marker started");

        while !self.ctx.termination.is_raised() {
            stats.iterations += 1;
            self.review_rubric(&mut stats).await;

            match self.seek_and_mark(&mut stats).await {
                Seek::Marked => {}
                Seek::Idle => self.pause(self.ctx.config.idle_backoff_ms).await,
                Seek::Stopping => break,
            }
            self.pause(self.ctx.config.loop_pause_ms).await;
        }

        tracing::info!(
            worker = self.id,
            iterations = stats.iterations,
            questions_marked = stats.questions_marked,
            rubric_corrections = stats.rubric_corrections,
            "Marker finished"
        );
        stats
    }

    async fn review_rubric(&self, stats: &mut MarkerStats) {
        match self.ctx.reviewer.review(&self.ctx.rubric, self.id).await {
            Ok(ReviewOutcome::Corrected { .. }) => stats.rubric_corrections += 1,
            Ok(ReviewOutcome::PersistFailed { question }) => {
                stats.rubric_corrections += 1;
                stats.persist_failures += 1;
                tracing::warn!(
                    worker = self.id,
                    line = question + 1,
                    "Rubric correction kept in memory only"
                );
            }
            Ok(ReviewOutcome::Clean) | Ok(ReviewOutcome::Stale { .. }) => {}
            Err(e) => {
                tracing::warn!(worker = self.id, error = %e, "Rubric review failed");
            }
        }
    }

    async fn seek_and_mark(&self, stats: &mut MarkerStats) -> Seek {
        loop {
            if let Some(slot) = self.ctx.pool.find_claimable().await {
                return self.mark_one(&slot, stats).await;
            }

            // The sentinel may have just been loaded by this very marker.
            if self.ctx.termination.is_raised() {
                return Seek::Stopping;
            }

            match self
                .ctx
                .pool
                .load_next(self.ctx.exams.as_ref(), &self.ctx.termination)
                .await
            {
                LoadOutcome::Claimable(_) => {}
                LoadOutcome::Loaded(slot) => {
                    stats.exams_loaded += 1;
                    tracing::debug!(worker = self.id, student = %slot.student(), "Loaded exam");
                }
                LoadOutcome::Skipped { key } => {
                    stats.load_failures += 1;
                    tracing::debug!(worker = self.id, key = %key, "Exam skipped");
                }
                LoadOutcome::NoMoreWork => return Seek::Idle,
            }
        }
    }

    async fn mark_one(&self, slot: &ExamSlot, stats: &mut MarkerStats) -> Seek {
        let Some(question) = slot.claim_question().await else {
            // Every question is claimed; others are still marking them.
            return Seek::Idle;
        };

        tracing::info!(
            worker = self.id,
            student = %slot.student(),
            question = question + 1,
            "Marking question"
        );
        let delay = self.ctx.config.marking_delay;
        if !delay.is_zero() {
            tokio::time::sleep(random_delay(delay)).await;
        }

        let completed = slot.complete_question(question).await;
        stats.questions_marked += 1;
        tracing::info!(
            worker = self.id,
            student = %slot.student(),
            question = question + 1,
            completed,
            of = slot.question_count(),
            "Finished marking question"
        );
        Seek::Marked
    }

    /// Sleep for `ms`, waking early if termination is raised.
    async fn pause(&self, ms: u64) {
        if ms == 0 {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
            _ = self.ctx.termination.raised() => {}
        }
    }
}
