//! Exams and their grading progress.
//!
//! - [`ExamSlot`]: shared record of one loaded exam, guarded by its own lock
//! - [`ExamSource`]: where exams come from (a directory of files, or memory)
//!
//! Exams are identified twice: by the source key they were listed under
//! (`exam_0001.txt`) and by the student number read from their header
//! ([`ExamId`]). The student number decides whether an exam is the
//! end-of-pile sentinel.

pub mod slot;
pub mod source;

pub use slot::{ExamSlot, SlotState};
pub use source::{DirExamSource, ExamPayload, ExamSource, MemoryExamSource};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Student number written at the top of an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExamId(pub u32);

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for ExamId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(ExamId)
    }
}
