//! Work coordination shared by all markers.
//!
//! - [`WorkPool`]: loaded exams and the lazy-loading frontier
//! - [`TerminationSignal`]: set once the end of the exam pile is reached

pub mod pool;
pub mod termination;

pub use pool::{LoadOutcome, WorkPool};
pub use termination::TerminationSignal;
