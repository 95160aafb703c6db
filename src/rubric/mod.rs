//! Shared grading rubric.
//!
//! Every marker reviews the rubric before each question it marks, and now
//! and then rewrites one line of it. Reads vastly outnumber writes, so the
//! text lives in a readers-writer [`RubricStore`]:
//!
//! 1. A marker joins the current read epoch and scans the lines
//! 2. If a line is flagged, it leaves the epoch and takes the write lock
//! 3. It re-reads the text, applies the correction and commits
//! 4. The commit is persisted through the [`RubricSource`] before the lock
//!    is released
//!
//! Results of the read pass are advisory: the write pass always works on
//! the freshest committed text.

pub mod review;
pub mod source;
pub mod store;

pub use review::{CorrectionPolicy, NoCorrection, RandomCorrection, ReviewOutcome, RubricReviewer};
pub use source::{FileRubricSource, MemoryRubricSource, RubricSource};
pub use store::{ReadTicket, RubricStore, WriteTicket};
