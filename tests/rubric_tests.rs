mod test_harness;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ta_marking::config::DelayRange;
use ta_marking::rubric::{NoCorrection, ReviewOutcome, RubricReviewer, RubricSource};
use ta_marking::MarkingError;
use test_harness::{always_first_line, memory_rubric_store};

#[tokio::test]
async fn test_readers_do_not_block_each_other() {
    let (store, _source) = memory_rubric_store("1, A\n");

    let first = store.begin_read().await.unwrap();
    let second = tokio::time::timeout(Duration::from_millis(200), store.begin_read())
        .await
        .expect("second reader should not wait for the first")
        .unwrap();

    assert_eq!(store.active_readers(), 2);
    assert_eq!(first.text().await, "1, A\n");
    assert_eq!(second.text().await, "1, A\n");

    store.end_read(first);
    store.end_read(second);
    assert_eq!(store.active_readers(), 0);
}

#[tokio::test]
async fn test_writer_waits_for_last_reader() {
    let (store, _source) = memory_rubric_store("1, A\n");
    let reader = store.begin_read().await.unwrap();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            let ticket = store.begin_write().await.unwrap();
            store.commit_write(ticket, "1, B\n".to_string()).await.unwrap()
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!writer.is_finished(), "writer must wait for the read epoch");
    assert_eq!(store.version(), 0);
    assert_eq!(reader.text().await, "1, A\n");

    store.end_read(reader);
    let version = tokio::time::timeout(Duration::from_secs(1), writer)
        .await
        .expect("writer should proceed once readers leave")
        .unwrap();
    assert_eq!(version, 1);
    assert_eq!(store.snapshot().await, "1, B\n");
}

#[tokio::test]
async fn test_reader_waits_for_writer_and_sees_commit() {
    let (store, _source) = memory_rubric_store("1, A\n");
    let ticket = store.begin_write().await.unwrap();

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let ticket = store.begin_read().await.unwrap();
            let text = ticket.text().await;
            store.end_read(ticket);
            text
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!reader.is_finished(), "reader must wait for the writer");

    store
        .commit_write(ticket, "1, Z\n".to_string())
        .await
        .unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(1), reader)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, "1, Z\n");
}

#[tokio::test]
async fn test_writers_are_mutually_exclusive() {
    let (store, _source) = memory_rubric_store("1, A\n");
    let first = store.begin_write().await.unwrap();

    let second = tokio::time::timeout(Duration::from_millis(50), store.begin_write()).await;
    assert!(second.is_err(), "second writer must wait");

    drop(first);
    let second = tokio::time::timeout(Duration::from_secs(1), store.begin_write())
        .await
        .expect("dropping a write ticket releases the lock")
        .unwrap();
    drop(second);

    // Neither ticket committed.
    assert_eq!(store.version(), 0);
    assert_eq!(store.snapshot().await, "1, A\n");
}

#[tokio::test]
async fn test_panicking_reader_releases_writers() {
    let (store, _source) = memory_rubric_store("1, A\n");
    let other = store.begin_read().await.unwrap();

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let _ticket = store.begin_read().await.unwrap();
            panic!("reader failed mid-epoch");
        })
    };
    assert!(reader.await.unwrap_err().is_panic());
    assert_eq!(store.active_readers(), 1);

    store.end_read(other);
    assert_eq!(store.active_readers(), 0);

    let ticket = tokio::time::timeout(Duration::from_secs(1), store.begin_write())
        .await
        .expect("writer must get in after the panicked reader unwound")
        .unwrap();
    store
        .commit_write(ticket, "1, B\n".to_string())
        .await
        .unwrap();

    // A fresh read epoch still works afterwards.
    let ticket = store.begin_read().await.unwrap();
    assert_eq!(ticket.text().await, "1, B\n");
    store.end_read(ticket);
}

#[tokio::test]
async fn test_sole_panicking_reader_releases_writers() {
    let (store, _source) = memory_rubric_store("1, A\n");

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let _ticket = store.begin_read().await.unwrap();
            panic!("reader failed mid-epoch");
        })
    };
    assert!(reader.await.unwrap_err().is_panic());
    assert_eq!(store.active_readers(), 0);

    let ticket = tokio::time::timeout(Duration::from_secs(1), store.begin_write())
        .await
        .expect("writer must get in after the panicked reader unwound")
        .unwrap();
    drop(ticket);
}

#[tokio::test]
async fn test_commit_persists_before_release() {
    let (store, source) = memory_rubric_store("1, A\n2, B\n");
    let ticket = store.begin_write().await.unwrap();
    let version = store
        .commit_write(ticket, "1, A\n2, C\n".to_string())
        .await
        .unwrap();

    assert_eq!(version, 1);
    assert_eq!(source.read().await.unwrap(), "1, A\n2, C\n");
    assert_eq!(source.history().await, vec!["1, A\n2, C\n".to_string()]);
}

#[tokio::test]
async fn test_persist_failure_keeps_memory_and_releases_lock() {
    let (store, source) = memory_rubric_store("1, A\n");
    source.set_fail_writes(true);

    let ticket = store.begin_write().await.unwrap();
    let err = store
        .commit_write(ticket, "1, B\n".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, MarkingError::RubricWrite(_)));
    assert!(!err.is_fatal());

    // In-memory and on-disk rubric now diverge.
    assert_eq!(store.snapshot().await, "1, B\n");
    assert_eq!(store.version(), 1);
    assert_eq!(source.current().await, "1, A\n");

    let ticket = tokio::time::timeout(Duration::from_secs(1), store.begin_write())
        .await
        .expect("lock must be released after a failed persist")
        .unwrap();
    drop(ticket);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_writes() {
    let initial = "1, A\n2, A\n3, A\n".to_string();
    let (store, source) = memory_rubric_store(&initial);

    let mut writers = Vec::new();
    for writer in 0..4u32 {
        let store = store.clone();
        writers.push(tokio::spawn(async move {
            for round in 0..25u32 {
                let ticket = store.begin_write().await.unwrap();
                let text: String = (1..=3)
                    .map(|line| format!("{}, w{}r{}\n", line, writer, round))
                    .collect();
                store.commit_write(ticket, text).await.unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..50 {
                let ticket = store.begin_read().await.unwrap();
                seen.push(ticket.text().await);
                store.end_read(ticket);
                tokio::task::yield_now().await;
            }
            seen
        }));
    }

    for writer in writers {
        writer.await.unwrap();
    }
    let mut observed = Vec::new();
    for reader in readers {
        observed.extend(reader.await.unwrap());
    }

    let committed: HashSet<String> = source
        .history()
        .await
        .into_iter()
        .chain(std::iter::once(initial))
        .collect();
    for text in &observed {
        assert!(committed.contains(text), "observed uncommitted text {:?}", text);
    }
    assert_eq!(store.version(), 100);
    assert_eq!(store.active_readers(), 0);
}

#[tokio::test]
async fn test_review_corrects_first_flagged_line() {
    let (store, source) = memory_rubric_store("1, A\n2, B\n3, C\n");
    let reviewer = RubricReviewer::new(
        Arc::new(|question: usize, _: &str| question >= 1),
        DelayRange::ZERO,
    );

    let outcome = reviewer.review(&store, 1).await.unwrap();
    assert_eq!(
        outcome,
        ReviewOutcome::Corrected {
            question: 1,
            before: "2, B".to_string(),
            after: "2, C".to_string(),
            version: 1,
        }
    );
    assert_eq!(source.current().await, "1, A\n2, C\n3, C\n");
    assert_eq!(store.active_readers(), 0);
}

#[tokio::test]
async fn test_review_without_flags_is_clean() {
    let (store, source) = memory_rubric_store("1, A\n2, B\n");
    let reviewer = RubricReviewer::new(Arc::new(NoCorrection), DelayRange::ZERO);

    assert_eq!(reviewer.review(&store, 1).await.unwrap(), ReviewOutcome::Clean);
    assert_eq!(store.version(), 0);
    assert!(source.history().await.is_empty());
}

#[tokio::test]
async fn test_review_of_uncorrectable_line_is_stale() {
    let (store, source) = memory_rubric_store("1, A\n2,\n");
    let reviewer = RubricReviewer::new(
        Arc::new(|question: usize, _: &str| question == 1),
        DelayRange::ZERO,
    );

    assert_eq!(
        reviewer.review(&store, 1).await.unwrap(),
        ReviewOutcome::Stale { question: 1 }
    );
    assert_eq!(store.version(), 0);
    assert!(source.history().await.is_empty());
}

#[tokio::test]
async fn test_review_reports_persist_failure() {
    let (store, source) = memory_rubric_store("1, A\n");
    source.set_fail_writes(true);
    let reviewer = RubricReviewer::new(always_first_line(), DelayRange::ZERO);

    assert_eq!(
        reviewer.review(&store, 1).await.unwrap(),
        ReviewOutcome::PersistFailed { question: 0 }
    );
    assert_eq!(store.snapshot().await, "1, B\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_corrections_are_not_lost() {
    let (store, _source) = memory_rubric_store("1, A\n2, A\n");
    let reviewer = RubricReviewer::new(always_first_line(), DelayRange::new(0, 2));

    let mut tasks = Vec::new();
    for worker in 1..=5 {
        let store = store.clone();
        let reviewer = reviewer.clone();
        tasks.push(tokio::spawn(async move {
            reviewer.review(&store, worker).await.unwrap()
        }));
    }
    for task in tasks {
        assert!(matches!(
            task.await.unwrap(),
            ReviewOutcome::Corrected { question: 0, .. }
        ));
    }

    // Each writer re-read the freshest text, so all five bumps landed.
    assert_eq!(store.snapshot().await, "1, F\n2, A\n");
    assert_eq!(store.version(), 5);
}
