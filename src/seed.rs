use std::path::{Path, PathBuf};

use crate::error::{MarkingError, Result};
use crate::exam::ExamId;
use crate::rubric::source::sample_rubric;

pub const RUBRIC_FILE: &str = "rubric.txt";

/// Files written by [`seed_fixtures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub exam_files: Vec<PathBuf>,
    pub rubric_file: PathBuf,
}

/// Zero-padded to `width` digits so that names sort in load order.
pub fn exam_file_name(index: usize, width: usize) -> String {
    format!("exam_{:0width$}.txt", index, width = width)
}

/// Digits needed for every index of a pile of `files` files, at least four.
fn name_width(files: usize) -> usize {
    files.to_string().len().max(4)
}

/// Write a demo exam pile into `dir`.
///
/// Produces `exams` exams for students 0001, 0002, ... followed by one exam
/// for the `sentinel` student, plus a rubric with `rubric_lines` lines.
///
/// # Errors
///
/// Returns [`MarkingError::Config`] when a regular student number would reach
/// the sentinel's, since that exam would end the run early.
pub async fn seed_fixtures(
    dir: &Path,
    exams: usize,
    questions: usize,
    rubric_lines: usize,
    sentinel: ExamId,
) -> Result<SeedSummary> {
    let last_student = u32::try_from(exams)
        .ok()
        .filter(|&last| last < sentinel.0)
        .ok_or_else(|| {
            MarkingError::Config(format!(
                "{} exams would reach sentinel student {}",
                exams, sentinel
            ))
        })?;

    tokio::fs::create_dir_all(dir).await?;

    let width = name_width(exams + 1);
    let mut exam_files = Vec::with_capacity(exams + 1);
    let students = (1..=last_student).map(ExamId).chain(std::iter::once(sentinel));
    for (index, student) in (1..).zip(students) {
        let path = dir.join(exam_file_name(index, width));
        tokio::fs::write(&path, exam_body(student, questions)).await?;
        exam_files.push(path);
    }

    let rubric_file = dir.join(RUBRIC_FILE);
    tokio::fs::write(&rubric_file, sample_rubric(rubric_lines)).await?;

    tracing::info!(
        dir = %dir.display(),
        exams,
        sentinel = %sentinel,
        "Seeded exam pile"
    );
    Ok(SeedSummary {
        exam_files,
        rubric_file,
    })
}

fn exam_body(student: ExamId, questions: usize) -> String {
    let mut body = format!("{}\nQuestions: {}\n", student, questions);
    for question in 1..=questions {
        body.push_str(&format!("Q{}: answer of student {}\n", question, student));
    }
    body
}
