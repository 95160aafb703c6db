use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::MarkingConfig;
use crate::error::{MarkingError, Result};
use crate::exam::ExamSource;
use crate::report::RunReport;
use crate::rubric::{CorrectionPolicy, RandomCorrection, RubricReviewer, RubricSource, RubricStore};
use crate::scheduler::{TerminationSignal, WorkPool};
use crate::worker::{Marker, MarkerContext};

/// One marking run: the shared containers plus the markers working on them.
pub struct MarkingSession {
    config: Arc<MarkingConfig>,
    exams: Arc<dyn ExamSource>,
    rubric: Arc<RubricStore>,
    pool: Arc<WorkPool>,
    policy: Arc<dyn CorrectionPolicy>,
    termination: TerminationSignal,
}

impl MarkingSession {
    /// Validate the configuration and read both sources.
    ///
    /// # Errors
    ///
    /// Fails before any marker starts if the worker count is invalid, the
    /// rubric cannot be read, or the exam source cannot be listed or lists
    /// no exams.
    pub async fn open(
        config: MarkingConfig,
        exams: Arc<dyn ExamSource>,
        rubric_source: Arc<dyn RubricSource>,
    ) -> Result<Self> {
        config.validate()?;

        let rubric = RubricStore::load(rubric_source).await?;
        let keys = exams.list_identifiers().await?;
        if keys.is_empty() {
            return Err(MarkingError::ExamSourceUnavailable(
                "no exams found".to_string(),
            ));
        }

        tracing::info!(
            workers = config.workers,
            exams = keys.len(),
            sentinel = %config.sentinel,
            "Marking session opened"
        );

        Ok(Self {
            policy: Arc::new(RandomCorrection::new(config.correction_probability)),
            pool: Arc::new(WorkPool::new(keys, config.sentinel)),
            rubric: Arc::new(rubric),
            config: Arc::new(config),
            exams,
            termination: TerminationSignal::new(),
        })
    }

    /// Replace the rubric correction policy.
    pub fn with_policy(mut self, policy: Arc<dyn CorrectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &MarkingConfig {
        &self.config
    }

    pub fn termination(&self) -> TerminationSignal {
        self.termination.clone()
    }

    pub fn rubric(&self) -> Arc<RubricStore> {
        self.rubric.clone()
    }

    pub fn pool(&self) -> Arc<WorkPool> {
        self.pool.clone()
    }

    /// Spawn the markers, wait for all of them to stop, and report.
    ///
    /// Markers stop once the termination signal is raised, either by loading
    /// the sentinel exam or from outside through [`Self::termination`].
    ///
    /// # Errors
    ///
    /// If a marker panics, the others are stopped and joined, then the first
    /// failure is returned.
    pub async fn run(self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(run_id = %run_id, workers = self.config.workers, "Starting markers");

        let ctx = MarkerContext {
            config: self.config.clone(),
            rubric: self.rubric.clone(),
            reviewer: RubricReviewer::new(self.policy.clone(), self.config.review_delay),
            pool: self.pool.clone(),
            exams: self.exams.clone(),
            termination: self.termination.clone(),
        };

        let mut markers = JoinSet::new();
        for id in 1..=self.config.workers {
            markers.spawn(Marker::new(id, ctx.clone()).run());
        }
        drop(ctx);

        let mut workers = Vec::with_capacity(self.config.workers);
        let mut failure = None;
        while let Some(joined) = markers.join_next().await {
            match joined {
                Ok(stats) => workers.push(stats),
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "Marker failed, stopping the rest");
                    // Stop the remaining markers, but still wait for them.
                    self.termination.raise();
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e.into());
        }
        workers.sort_by_key(|stats| stats.worker);

        let report =
            RunReport::collect(run_id, started_at, workers, &self.pool, &self.rubric).await;
        tracing::info!(
            run_id = %run_id,
            exams = report.exams.len(),
            total_marked = report.total_marked,
            rubric_version = report.rubric_version,
            "All markers finished"
        );
        Ok(report)
    }
}
