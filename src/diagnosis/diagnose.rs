//! Best-candidate selection and structured error diagnosis.
//!
//! [`diagnose`] aligns the recognised transcription against every canonical
//! candidate, keeps the one with the lowest normalised cost (first-listed on
//! ties) and turns its alignment into a [`DiagnosisResult`].
//!
//! `error_count` counts every non-match operation, insertions included, so it
//! may exceed `phoneme_count` when the learner adds extra phonemes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnosis::align::{align, Alignment, EditOp};
use crate::diagnosis::phonemes::{tokenize, PhonemeClass};

// ---------------------------------------------------------------------------
// DiagnosisError
// ---------------------------------------------------------------------------

/// Malformed target sets.  Both variants surface as `InvalidInput`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiagnosisError {
    #[error("no canonical transcriptions supplied")]
    NoCandidates,

    #[error("canonical transcription #{index} contains no phonemes: {text:?}")]
    EmptyCandidate { index: usize, text: String },
}

// ---------------------------------------------------------------------------
// ErrorCategory / ErrorDetail
// ---------------------------------------------------------------------------

/// Kind of a single pronunciation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Substitution,
    Insertion,
    Deletion,
}

impl ErrorCategory {
    fn from_op(op: EditOp) -> Option<Self> {
        match op {
            EditOp::Match => None,
            EditOp::Substitution => Some(ErrorCategory::Substitution),
            EditOp::Insertion => Some(ErrorCategory::Insertion),
            EditOp::Deletion => Some(ErrorCategory::Deletion),
        }
    }
}

/// One entry of [`DiagnosisResult::error_summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Index into the aligned (gap-padded) sequences.
    pub position: usize,
    /// Target phoneme; `None` for insertions.
    pub expected: Option<String>,
    /// Phoneme the learner produced; `None` for deletions.
    pub actual: Option<String>,
    pub category: ErrorCategory,
    /// Class of the expected phoneme (of the actual one for insertions).
    pub class: PhonemeClass,
}

// ---------------------------------------------------------------------------
// DiagnosisResult
// ---------------------------------------------------------------------------

/// Structured record of alignment errors for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// The canonical transcription the attempt was judged against.
    pub best_match: String,
    /// Index of `best_match` in the candidate list.
    pub best_match_index: usize,
    /// Recognised transcription as received.
    pub recognized: String,
    pub aligned_target: Vec<Option<String>>,
    pub aligned_user: Vec<Option<String>>,
    pub ops: Vec<EditOp>,
    pub error_count: usize,
    /// Number of phonemes in `best_match`.
    pub phoneme_count: usize,
    pub error_summary: Vec<ErrorDetail>,
}

impl DiagnosisResult {
    fn from_alignment(
        best_match: String,
        best_match_index: usize,
        recognized: String,
        alignment: Alignment,
    ) -> Self {
        let error_summary: Vec<ErrorDetail> = alignment
            .ops
            .iter()
            .enumerate()
            .filter_map(|(position, op)| {
                let category = ErrorCategory::from_op(*op)?;
                let expected = alignment.target[position].clone();
                let actual = alignment.user[position].clone();
                let class = expected
                    .as_deref()
                    .or(actual.as_deref())
                    .map(PhonemeClass::of)
                    .unwrap_or(PhonemeClass::Other);
                Some(ErrorDetail {
                    position,
                    expected,
                    actual,
                    category,
                    class,
                })
            })
            .collect();

        Self {
            best_match,
            best_match_index,
            recognized,
            error_count: error_summary.len(),
            phoneme_count: alignment.target_len,
            aligned_target: alignment.target,
            aligned_user: alignment.user,
            ops: alignment.ops,
            error_summary,
        }
    }

    /// `true` when the attempt matched `best_match` exactly.
    pub fn is_perfect(&self) -> bool {
        self.error_count == 0
    }

    /// Errors per target phoneme.  Can exceed 1.0 when insertions pile up.
    pub fn error_rate(&self) -> f64 {
        self.error_count as f64 / self.phoneme_count.max(1) as f64
    }

    /// `1 - error_rate`, clamped to `[0, 1]`.
    pub fn accuracy(&self) -> f64 {
        1.0 - self.error_rate().min(1.0)
    }

    /// The expected phoneme most often mis-produced, earliest on ties.
    ///
    /// Insertions carry no expected phoneme and are ignored.  `None` for a
    /// perfect attempt or one with only insertions.
    pub fn focus_phoneme(&self) -> Option<&str> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for detail in &self.error_summary {
            let Some(expected) = detail.expected.as_deref() else {
                continue;
            };
            match counts.iter_mut().find(|(p, _)| *p == expected) {
                Some((_, n)) => *n += 1,
                None => counts.push((expected, 1)),
            }
        }

        // `max_by_key` keeps the last maximum; iterate reversed so the
        // earliest phoneme wins ties.
        counts
            .into_iter()
            .rev()
            .max_by_key(|(_, n)| *n)
            .map(|(p, _)| p)
    }
}

// ---------------------------------------------------------------------------
// diagnose
// ---------------------------------------------------------------------------

/// Diagnose a recognised transcription against an ordered candidate list.
///
/// ```
/// use pronunciation_coach::diagnosis::diagnose;
///
/// let result = diagnose(&["kæt", "kat"], "kat").unwrap();
/// assert_eq!(result.best_match, "kat");
/// assert_eq!(result.error_count, 0);
/// assert_eq!(result.phoneme_count, 3);
/// ```
pub fn diagnose<S: AsRef<str>>(
    candidates: &[S],
    recognized: &str,
) -> Result<DiagnosisResult, DiagnosisError> {
    if candidates.is_empty() {
        return Err(DiagnosisError::NoCandidates);
    }

    let user = tokenize(recognized);
    let mut best: Option<(usize, Alignment)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let target = tokenize(candidate.as_ref());
        if target.is_empty() {
            return Err(DiagnosisError::EmptyCandidate {
                index,
                text: candidate.as_ref().to_string(),
            });
        }

        let alignment = align(&target, &user);
        let better = match &best {
            None => true,
            // Strictly less: the earlier candidate keeps ties.
            Some((_, current)) => alignment.cmp_normalized(current).is_lt(),
        };
        if better {
            best = Some((index, alignment));
        }
    }

    let (index, alignment) = best.ok_or(DiagnosisError::NoCandidates)?;
    Ok(DiagnosisResult::from_alignment(
        candidates[index].as_ref().to_string(),
        index,
        recognized.to_string(),
        alignment,
    ))
}

// ---------------------------------------------------------------------------
// Attempt
// ---------------------------------------------------------------------------

/// One spoken attempt at a target word.  Ephemeral: only the resulting
/// [`DiagnosisResult`] is ever persisted.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub word_id: String,
    pub transcriptions: Vec<String>,
    pub recognized: String,
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    pub fn new(word_id: impl Into<String>, transcriptions: Vec<String>, recognized: String) -> Self {
        Self {
            word_id: word_id.into(),
            transcriptions,
            recognized,
            timestamp: Utc::now(),
        }
    }

    pub fn diagnose(&self) -> Result<DiagnosisResult, DiagnosisError> {
        diagnose(&self.transcriptions, &self.recognized)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
