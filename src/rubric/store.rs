use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, RwLock, Semaphore, SemaphorePermit};

use crate::error::{MarkingError, Result};
use crate::rubric::source::RubricSource;

/// Rubric text shared by every marker.
///
/// Readers and writers are coordinated with the classic first-reader /
/// last-reader protocol built from exclusive primitives:
///
/// - `readers` counts active readers. It is a blocking mutex so that a
///   ticket can leave the epoch from `Drop`, and is never held across an
///   `.await`
/// - `entry` serialises readers joining the epoch, so that only one of them
///   can be waiting on the gate
/// - `writer_gate` is a single permit. A writer holds it for the duration of
///   its critical section. The first reader of an epoch takes it on behalf
///   of all readers and the last reader of the epoch hands it back.
///
/// Readers never wait on each other, only on a writer that already holds the
/// gate. A continuous stream of overlapping readers starves writers.
pub struct RubricStore {
    text: RwLock<String>,
    readers: std::sync::Mutex<usize>,
    entry: Mutex<()>,
    writer_gate: Semaphore,
    version: AtomicU64,
    source: Arc<dyn RubricSource>,
}

/// Membership in the current read epoch. Dropping it leaves the epoch, so a
/// reader that unwinds still lets writers back in.
#[must_use = "dropping a read ticket ends the read immediately"]
#[derive(Debug)]
pub struct ReadTicket<'a> {
    store: &'a RubricStore,
}

impl Drop for ReadTicket<'_> {
    fn drop(&mut self) {
        let mut readers = self.store.lock_readers();
        *readers = readers.saturating_sub(1);
        if *readers == 0 {
            self.store.writer_gate.add_permits(1);
        }
    }
}

impl ReadTicket<'_> {
    pub async fn text(&self) -> String {
        self.store.text.read().await.clone()
    }
}

/// Exclusive access to the rubric. Dropping it without committing releases
/// the lock and leaves the text untouched.
#[must_use = "dropping a write ticket discards the write"]
#[derive(Debug)]
pub struct WriteTicket<'a> {
    store: &'a RubricStore,
    _permit: SemaphorePermit<'a>,
}

impl WriteTicket<'_> {
    /// Text as of the last commit, which may be newer than what an earlier
    /// read pass saw.
    pub async fn text(&self) -> String {
        self.store.text.read().await.clone()
    }
}

impl RubricStore {
    pub fn new(initial: impl Into<String>, source: Arc<dyn RubricSource>) -> Self {
        Self {
            text: RwLock::new(initial.into()),
            readers: std::sync::Mutex::new(0),
            entry: Mutex::new(()),
            writer_gate: Semaphore::new(1),
            version: AtomicU64::new(0),
            source,
        }
    }

    /// Read the initial text from `source`.
    pub async fn load(source: Arc<dyn RubricSource>) -> Result<Self> {
        let text = source.read().await?;
        tracing::info!(lines = text.lines().count(), "Rubric loaded");
        Ok(Self::new(text, source))
    }

    pub async fn begin_read(&self) -> Result<ReadTicket<'_>> {
        let _entry = self.entry.lock().await;
        {
            let mut readers = self.lock_readers();
            if *readers > 0 {
                *readers += 1;
                return Ok(ReadTicket { store: self });
            }
        }

        // First reader locks writers out for the whole epoch. No reader can
        // leave while the count is zero, and `entry` keeps later readers
        // from slipping past a writer that still owns the gate.
        self.writer_gate
            .acquire()
            .await
            .map_err(|_| MarkingError::LockClosed("rubric writer gate".to_string()))?
            .forget();
        *self.lock_readers() += 1;
        Ok(ReadTicket { store: self })
    }

    /// Leave the read epoch. The last reader out readmits writers.
    pub fn end_read(&self, ticket: ReadTicket<'_>) {
        drop(ticket);
    }

    pub async fn begin_write(&self) -> Result<WriteTicket<'_>> {
        let permit = self
            .writer_gate
            .acquire()
            .await
            .map_err(|_| MarkingError::LockClosed("rubric writer gate".to_string()))?;
        Ok(WriteTicket {
            store: self,
            _permit: permit,
        })
    }

    /// Publish `new_text` and persist it before releasing the write lock.
    ///
    /// The in-memory text advances even if persisting fails; the failure is
    /// returned once the lock has been released. Returns the new version.
    pub async fn commit_write(&self, ticket: WriteTicket<'_>, new_text: String) -> Result<u64> {
        *self.text.write().await = new_text.clone();
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        let persisted = self.source.write(&new_text).await;
        drop(ticket);

        persisted.map(|()| version).map_err(|e| {
            tracing::warn!(version, error = %e, "Rubric updated in memory but not persisted");
            e
        })
    }

    /// Number of committed writes.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn active_readers(&self) -> usize {
        *self.lock_readers()
    }

    fn lock_readers(&self) -> std::sync::MutexGuard<'_, usize> {
        self.readers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Text outside of the read/write protocol, for reporting once markers
    /// have stopped.
    pub async fn snapshot(&self) -> String {
        self.text.read().await.clone()
    }
}

impl std::fmt::Debug for RubricStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RubricStore")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
