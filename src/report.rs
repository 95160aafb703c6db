use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::exam::ExamId;
use crate::rubric::RubricStore;
use crate::scheduler::WorkPool;
use crate::worker::MarkerStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamSummary {
    pub key: String,
    pub student: ExamId,
    pub question_count: usize,
    pub completed: usize,
    pub sentinel: bool,
}

/// Outcome of a finished marking run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub workers: Vec<MarkerStats>,
    pub exams: Vec<ExamSummary>,
    pub identifiers_consumed: usize,
    pub identifiers_total: usize,
    pub rubric_version: u64,
    pub rubric: String,
    /// Questions completed across all non-sentinel exams.
    pub total_marked: usize,
}

impl RunReport {
    /// Gather the final state once every marker has been joined.
    pub async fn collect(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        workers: Vec<MarkerStats>,
        pool: &WorkPool,
        rubric: &RubricStore,
    ) -> Self {
        let exams: Vec<ExamSummary> = pool
            .slots()
            .await
            .iter()
            .map(|slot| ExamSummary {
                key: slot.key().to_string(),
                student: slot.student(),
                question_count: slot.question_count(),
                completed: slot.completed(),
                sentinel: slot.student() == pool.sentinel(),
            })
            .collect();
        let total_marked = exams
            .iter()
            .filter(|exam| !exam.sentinel)
            .map(|exam| exam.completed)
            .sum();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            workers,
            exams,
            identifiers_consumed: pool.consumed().await,
            identifiers_total: pool.total(),
            rubric_version: rubric.version(),
            rubric: rubric.snapshot().await,
            total_marked,
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run {}\n", self.run_id));
        out.push_str(&format!(
            "Exams loaded: {} ({} of {} identifiers consumed)\n",
            self.exams.len(),
            self.identifiers_consumed,
            self.identifiers_total
        ));
        out.push_str(&format!("Questions marked: {}\n", self.total_marked));
        out.push_str(&format!("Rubric revisions: {}\n", self.rubric_version));
        out.push_str(&format!("Elapsed: {}ms\n\n", self.elapsed_ms()));

        out.push_str(&format!(
            "{:<16} {:<8} {:<10}\n",
            "EXAM", "STUDENT", "PROGRESS"
        ));
        out.push_str(&format!("{}\n", "-".repeat(36)));
        for exam in &self.exams {
            let progress = if exam.sentinel {
                "sentinel".to_string()
            } else {
                format!("{}/{}", exam.completed, exam.question_count)
            };
            out.push_str(&format!(
                "{:<16} {:<8} {:<10}\n",
                exam.key,
                exam.student.to_string(),
                progress
            ));
        }

        out.push_str(&format!(
            "\n{:<8} {:<8} {:<12} {:<8} {:<8}\n",
            "WORKER", "MARKED", "CORRECTIONS", "LOADS", "LOOPS"
        ));
        out.push_str(&format!("{}\n", "-".repeat(48)));
        for worker in &self.workers {
            out.push_str(&format!(
                "{:<8} {:<8} {:<12} {:<8} {:<8}\n",
                worker.worker,
                worker.questions_marked,
                worker.rubric_corrections,
                worker.exams_loaded,
                worker.iterations
            ));
        }
        out
    }
}
