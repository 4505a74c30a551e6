//! Learner progress record, history log and read-only projections.
//!
//! [`LearnerProgress`] is the single persisted record per learner.  It is
//! only ever changed through [`ProgressionMachine::apply`], which returns a
//! new record with the pre-mutation [`ProgressSnapshot`] appended to
//! `history`; nothing is overwritten in place.
//!
//! [`ProgressionMachine::apply`]: crate::progression::ProgressionMachine::apply

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::DiagnosisResult;
use crate::progression::level::{calibration_band, DifficultyLevel};

// ---------------------------------------------------------------------------
// Mode / Action
// ---------------------------------------------------------------------------

/// Top-level learner state.
///
/// ```text
/// Calibration(1) ─submit─▶ Calibration(2) ─ … ─▶ Calibration(20) ─submit─▶ Practice
///        ▲                                                                   │
///        └──────────────────────── admin reset ──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Calibration,
    Practice,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Calibration => "calibration",
            Mode::Practice => "practice",
        }
    }
}

/// What the learner should do next after a diagnosed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Try the same word again.
    Repeat,
    /// Move up one band and take a new word.
    Advance,
    /// Move down one band and take a new word.
    Regress,
    /// Stay in the band (or calibration sequence) with a new word.
    Continue,
}

impl Action {
    /// `true` when the action requires a fresh practice word.
    pub fn needs_new_word(self) -> bool {
        self != Action::Repeat
    }
}

// ---------------------------------------------------------------------------
// PracticeWord
// ---------------------------------------------------------------------------

/// A target word with its canonical transcriptions, in preference order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeWord {
    pub id: String,
    pub word: String,
    pub transcriptions: Vec<String>,
}

impl PracticeWord {
    pub fn new(id: impl Into<String>, word: impl Into<String>, transcriptions: Vec<String>) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            transcriptions,
        }
    }
}

// ---------------------------------------------------------------------------
// Calibration samples
// ---------------------------------------------------------------------------

/// Error counts recorded for one calibration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub step: u8,
    pub error_count: usize,
    pub phoneme_count: usize,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Everything in [`LearnerProgress`] except its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub mode: Mode,
    pub calibration_index: u8,
    pub cur_lvl: DifficultyLevel,
    pub cur_word: Option<PracticeWord>,
    pub cur_err: Option<usize>,
    pub suggested_level: Option<DifficultyLevel>,
    pub consecutive_success_streak: u32,
    pub consecutive_failure_streak: u32,
    pub awaiting_word: bool,
    #[serde(default)]
    pub word_claim: Option<WordClaim>,
}

/// Why a history entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    CalibrationStep,
    CalibrationCompleted,
    PracticeAttempt,
    WordReplaced,
    WordClaimed,
    CalibrationReset,
}

/// One append-only audit record: the state *before* a mutation plus what
/// caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub event: HistoryEvent,
    pub snapshot: ProgressSnapshot,
    pub diagnosis: Option<DiagnosisResult>,
    pub action: Option<Action>,
    pub idempotency_key: Option<String>,
}

// ---------------------------------------------------------------------------
// WordClaim
// ---------------------------------------------------------------------------

/// Marks one service instance as the selector of a learner's next word.
///
/// Written in the same commit that makes the current word stale, so every
/// instance sharing the store sees it.  A claim older than the configured
/// timeout is abandoned and may be taken over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordClaim {
    pub owner: String,
    pub claimed_at: DateTime<Utc>,
}

impl WordClaim {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            claimed_at: Utc::now(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now < self.claimed_at + timeout
    }
}

// ---------------------------------------------------------------------------
// LearnerProgress
// ---------------------------------------------------------------------------

/// Persistent per-learner calibration / practice state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProgress {
    pub learner_id: String,
    /// Target language code (e.g. `"en"`); selects word pools and endpoints.
    pub language: String,
    pub mode: Mode,
    /// Current calibration step, 1..=20.  Only meaningful in calibration.
    pub calibration_index: u8,
    /// Current band.  Mirrors the calibration step's band during calibration.
    pub cur_lvl: DifficultyLevel,
    pub cur_word: Option<PracticeWord>,
    /// Error count of the last diagnosed attempt.
    pub cur_err: Option<usize>,
    /// Set once when calibration completes; cleared only by an admin reset.
    pub suggested_level: Option<DifficultyLevel>,
    pub consecutive_success_streak: u32,
    pub consecutive_failure_streak: u32,
    /// Samples of the running calibration cycle, one per completed step.
    #[serde(default)]
    pub calibration_samples: Vec<CalibrationSample>,
    /// `cur_word` is stale: a next word is being selected or has to be.
    #[serde(default)]
    pub awaiting_word: bool,
    /// Who is selecting the next word, while `awaiting_word` is set.
    #[serde(default)]
    pub word_claim: Option<WordClaim>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl LearnerProgress {
    /// A fresh learner at `Calibration(1)` practising `first_word`.
    pub fn new(
        learner_id: impl Into<String>,
        language: impl Into<String>,
        first_word: Option<PracticeWord>,
    ) -> Self {
        Self {
            learner_id: learner_id.into(),
            language: language.into(),
            mode: Mode::Calibration,
            calibration_index: 1,
            cur_lvl: calibration_band(1),
            awaiting_word: first_word.is_none(),
            word_claim: None,
            cur_word: first_word,
            cur_err: None,
            suggested_level: None,
            consecutive_success_streak: 0,
            consecutive_failure_streak: 0,
            calibration_samples: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            mode: self.mode,
            calibration_index: self.calibration_index,
            cur_lvl: self.cur_lvl,
            cur_word: self.cur_word.clone(),
            cur_err: self.cur_err,
            suggested_level: self.suggested_level,
            consecutive_success_streak: self.consecutive_success_streak,
            consecutive_failure_streak: self.consecutive_failure_streak,
            awaiting_word: self.awaiting_word,
            word_claim: self.word_claim.clone(),
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.mode == Mode::Calibration
    }

    /// The history entry written for a submission with `key`, if any.
    pub fn find_submission(&self, key: &str) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .rev()
            .find(|entry| entry.idempotency_key.as_deref() == Some(key))
    }

    /// Diagnoses recorded so far, oldest first.
    pub fn diagnoses(&self) -> impl Iterator<Item = &DiagnosisResult> {
        self.history.iter().filter_map(|entry| entry.diagnosis.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// What the presentation layer shows as "the current item".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentItem {
    pub word: Option<PracticeWord>,
    pub band: DifficultyLevel,
    pub mode: Mode,
    /// Calibration step, present only while calibrating.
    pub calibration_step: Option<u8>,
}

/// Band the learner is currently working in.
pub fn current_band(progress: &LearnerProgress) -> DifficultyLevel {
    match progress.mode {
        Mode::Calibration => calibration_band(progress.calibration_index),
        Mode::Practice => progress.cur_lvl,
    }
}

pub fn current_item(progress: &LearnerProgress) -> CurrentItem {
    CurrentItem {
        word: progress.cur_word.clone(),
        band: current_band(progress),
        mode: progress.mode,
        calibration_step: progress
            .is_calibrating()
            .then_some(progress.calibration_index),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
