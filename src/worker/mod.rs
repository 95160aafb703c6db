//! Markers: the concurrent workers of a marking run.
//!
//! # Components
//!
//! - [`Marker`]: per-worker control loop
//! - [`timer`]: randomised delays standing in for human review and marking
//!
//! # Marking Flow
//!
//! 1. Review the rubric under the shared read lock, maybe correct one line
//! 2. Find an exam with unfinished questions, loading the next one if none
//! 3. Claim a question under the exam's lock, mark it with no lock held
//! 4. Record the completion under the exam's lock again
//!
//! No marker ever holds two of the rubric, pool and exam locks at once.

pub mod marker;
pub mod timer;

pub use marker::{Marker, MarkerContext, MarkerStats};
