use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{MarkingError, Result};
use crate::exam::ExamId;

const EXAM_FILE_PREFIX: &str = "exam_";
const EXAM_FILE_SUFFIX: &str = ".txt";

/// Raw exam as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamPayload {
    pub student: ExamId,
    pub question_count: usize,
    pub content: String,
}

/// Supplier of exams, consulted lazily as markers run out of work.
#[async_trait]
pub trait ExamSource: Send + Sync {
    /// Ordered identifiers of every exam in the pile.
    async fn list_identifiers(&self) -> Result<Vec<String>>;

    /// Load one exam by identifier.
    async fn load(&self, key: &str) -> Result<ExamPayload>;
}

/// Parse an exam file.
///
/// The first non-empty line holds the student number, optionally written as
/// `Student: 0001`. It may be followed by header lines of the form
/// `Label: value`, where the label is made of letters only; the header ends
/// at the first line that is blank or not shaped like that (`Q1: ...`). A
/// `Questions: N` header line overrides `default_questions`. The answers
/// below the header are never interpreted.
pub fn parse_exam(key: &str, content: String, default_questions: usize) -> Result<ExamPayload> {
    let malformed = |reason: String| MarkingError::MalformedExam {
        key: key.to_string(),
        reason,
    };

    let mut lines = content.lines().map(str::trim).skip_while(|line| line.is_empty());
    let header = lines
        .next()
        .ok_or_else(|| malformed("missing student number".to_string()))?;
    let number = strip_label(header, "student").unwrap_or(header);
    let student = number
        .parse::<ExamId>()
        .map_err(|e| malformed(format!("invalid student number {:?}: {}", number, e)))?;

    let mut question_count = default_questions;
    for line in lines.take_while(|line| is_header_line(line)) {
        if let Some(value) = strip_label(line, "questions") {
            question_count = value
                .parse::<usize>()
                .map_err(|e| malformed(format!("invalid question count {:?}: {}", value, e)))?;
        }
    }
    if question_count == 0 {
        return Err(malformed("exam has no questions".to_string()));
    }

    Ok(ExamPayload {
        student,
        question_count,
        content,
    })
}

fn is_header_line(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, _)| {
        let name = name.trim();
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ')
    })
}

/// `Label: value` with a case-insensitive label.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case(label)
        .then(|| value.trim())
}

/// Exams stored as `exam_*.txt` files in one directory, taken in file name
/// order.
#[derive(Debug, Clone)]
pub struct DirExamSource {
    dir: PathBuf,
    default_questions: usize,
}

impl DirExamSource {
    pub fn new(dir: impl Into<PathBuf>, default_questions: usize) -> Self {
        Self {
            dir: dir.into(),
            default_questions,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_exam_file(name: &str) -> bool {
        name.starts_with(EXAM_FILE_PREFIX) && name.ends_with(EXAM_FILE_SUFFIX)
    }
}

#[async_trait]
impl ExamSource for DirExamSource {
    async fn list_identifiers(&self) -> Result<Vec<String>> {
        let unavailable = |e: std::io::Error| {
            MarkingError::ExamSourceUnavailable(format!("{}: {}", self.dir.display(), e))
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(unavailable)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            if let Some(name) = entry.file_name().to_str() {
                if Self::is_exam_file(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        tracing::info!(dir = %self.dir.display(), exams = names.len(), "Listed exam files");
        Ok(names)
    }

    async fn load(&self, key: &str) -> Result<ExamPayload> {
        let path = self.dir.join(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MarkingError::ExamNotFound(path.display().to_string()))
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(MarkingError::MalformedExam {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        parse_exam(key, content, self.default_questions)
    }
}

#[derive(Debug)]
struct MemoryEntry {
    key: String,
    payload: Option<ExamPayload>,
    loads: AtomicUsize,
}

/// In-process exam pile. Entries added with [`MemoryExamSource::with_broken`]
/// fail to load as malformed.
#[derive(Debug, Default)]
pub struct MemoryExamSource {
    entries: Vec<MemoryEntry>,
}

impl MemoryExamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pile of `questions`-question exams, keyed by student number.
    pub fn from_students(students: &[u32], questions: usize) -> Self {
        students
            .iter()
            .fold(Self::new(), |source, &student| source.with_exam(student, questions))
    }

    pub fn with_exam(mut self, student: u32, questions: usize) -> Self {
        let id = ExamId(student);
        self.entries.push(MemoryEntry {
            key: id.to_string(),
            payload: Some(ExamPayload {
                student: id,
                question_count: questions,
                content: format!("{}\n", id),
            }),
            loads: AtomicUsize::new(0),
        });
        self
    }

    pub fn with_broken(mut self, key: impl Into<String>) -> Self {
        self.entries.push(MemoryEntry {
            key: key.into(),
            payload: None,
            loads: AtomicUsize::new(0),
        });
        self
    }

    /// How many times `key` has been loaded.
    pub fn load_count(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key == key)
            .map(|entry| entry.loads.load(Ordering::SeqCst))
            .sum()
    }

    pub fn total_loads(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.loads.load(Ordering::SeqCst))
            .sum()
    }
}

#[async_trait]
impl ExamSource for MemoryExamSource {
    async fn list_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key.clone()).collect())
    }

    async fn load(&self, key: &str) -> Result<ExamPayload> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .ok_or_else(|| MarkingError::ExamNotFound(key.to_string()))?;
        entry.loads.fetch_add(1, Ordering::SeqCst);

        entry.payload.clone().ok_or_else(|| MarkingError::MalformedExam {
            key: key.to_string(),
            reason: "unreadable header".to_string(),
        })
    }
}
