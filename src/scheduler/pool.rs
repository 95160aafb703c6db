use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::exam::{ExamId, ExamSlot, ExamSource};
use crate::scheduler::termination::TerminationSignal;

/// Result of asking the pool for more work.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Another marker made work available while this one waited for the
    /// load lock.
    Claimable(Arc<ExamSlot>),
    /// The next exam was loaded and appended.
    Loaded(Arc<ExamSlot>),
    /// The next identifier could not be loaded and was skipped.
    Skipped { key: String },
    /// Every identifier has been consumed.
    NoMoreWork,
}

/// How far into the source's identifier list loading has progressed.
#[derive(Debug)]
struct Frontier {
    keys: Vec<String>,
    consumed: usize,
}

/// Growable set of loaded exams plus the lazy-loading frontier.
///
/// Slots are only ever appended, and only while the frontier lock is held.
/// The frontier lock is distinct from every slot lock and is never held
/// while a slot lock is taken by the pool's callers.
#[derive(Debug)]
pub struct WorkPool {
    sentinel: ExamId,
    total: usize,
    slots: RwLock<Vec<Arc<ExamSlot>>>,
    frontier: Mutex<Frontier>,
}

impl WorkPool {
    pub fn new(keys: Vec<String>, sentinel: ExamId) -> Self {
        Self {
            sentinel,
            total: keys.len(),
            slots: RwLock::new(Vec::new()),
            frontier: Mutex::new(Frontier { keys, consumed: 0 }),
        }
    }

    pub fn sentinel(&self) -> ExamId {
        self.sentinel
    }

    /// First loaded exam that still has unfinished questions.
    pub async fn find_claimable(&self) -> Option<Arc<ExamSlot>> {
        self.slots
            .read()
            .await
            .iter()
            .find(|slot| slot.student() != self.sentinel && !slot.is_exhausted())
            .cloned()
    }

    /// Load the next exam from `source`, unless work turned up meanwhile.
    ///
    /// Loading the sentinel exam raises `termination`. So does finding the
    /// frontier exhausted with nothing claimable, which means every loaded
    /// exam is finished even though the source never delivered a sentinel.
    /// Once `termination` is raised no further identifiers are consumed.
    pub async fn load_next(
        &self,
        source: &dyn ExamSource,
        termination: &TerminationSignal,
    ) -> LoadOutcome {
        let mut frontier = self.frontier.lock().await;

        // Another marker may have loaded something while we waited.
        if let Some(slot) = self.find_claimable().await {
            return LoadOutcome::Claimable(slot);
        }

        // Nothing past the sentinel is ever loaded.
        if termination.is_raised() {
            return LoadOutcome::NoMoreWork;
        }

        if frontier.consumed >= frontier.keys.len() {
            if termination.raise() {
                tracing::warn!(
                    consumed = frontier.consumed,
                    "Exam source drained without a sentinel, signalling completion"
                );
            }
            return LoadOutcome::NoMoreWork;
        }

        let key = frontier.keys[frontier.consumed].clone();
        frontier.consumed += 1;

        let payload = match source.load(&key).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Skipping exam that failed to load");
                return LoadOutcome::Skipped { key };
            }
        };

        let slot = Arc::new(ExamSlot::new(key, payload));
        self.slots.write().await.push(slot.clone());
        tracing::info!(
            key = %slot.key(),
            student = %slot.student(),
            questions = slot.question_count(),
            consumed = frontier.consumed,
            total = self.total,
            "Exam loaded"
        );

        if slot.student() == self.sentinel && termination.raise() {
            tracing::info!(student = %slot.student(), "Sentinel exam loaded, signalling completion");
        }

        LoadOutcome::Loaded(slot)
    }

    /// Identifiers taken from the source so far, including skipped ones.
    pub async fn consumed(&self) -> usize {
        self.frontier.lock().await.consumed
    }

    /// Identifiers the source listed.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of loaded exams.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Loaded exams in load order.
    pub async fn slots(&self) -> Vec<Arc<ExamSlot>> {
        self.slots.read().await.clone()
    }
}
