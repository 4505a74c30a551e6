//! Legal transitions of [`LearnerProgress`].
//!
//! [`ProgressionMachine::apply`] is the only place progress changes.  It
//! never mutates its input: it returns a new record whose history ends with
//! the pre-mutation snapshot.  Anything outside the transition table fails
//! with [`ProgressionError::InvalidStateTransition`].
//!
//! | From             | Transition        | To                         |
//! |------------------|-------------------|----------------------------|
//! | Calibration(s<20)| `CalibrationStep` | Calibration(s+1)           |
//! | Calibration(20)  | `CalibrationStep` | Practice(suggested level)  |
//! | Practice         | `PracticeOutcome` | Practice(band ±1 or same)  |
//! | any              | `ClaimWord`       | same, `awaiting_word`      |
//! | any              | `ReplaceWord`     | same, new `cur_word`       |
//! | any              | `AdminReset`      | Calibration(1)             |
//!
//! A step that leaves `cur_word` stale (every calibration step, any practice
//! action but `Repeat`) sets `awaiting_word` and records the submitter's
//! [`WordClaim`] in the same record; `ReplaceWord` clears both.

use chrono::Utc;
use thiserror::Error;

use crate::config::CalibrationConfig;
use crate::diagnosis::DiagnosisResult;
use crate::progression::calibration::suggest_level;
use crate::progression::level::{calibration_band, CALIBRATION_STEPS};
use crate::progression::state::{
    Action, CalibrationSample, HistoryEntry, HistoryEvent, LearnerProgress, Mode, PracticeWord,
    WordClaim,
};

// ---------------------------------------------------------------------------
// ProgressionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressionError {
    #[error("cannot apply {attempted} while in {from}")]
    InvalidStateTransition { from: String, attempted: String },
}

impl ProgressionError {
    fn invalid(progress: &LearnerProgress, attempted: impl Into<String>) -> Self {
        let from = match progress.mode {
            Mode::Calibration => format!("calibration step {}", progress.calibration_index),
            Mode::Practice => format!("practice at {}", progress.cur_lvl),
        };
        ProgressionError::InvalidStateTransition {
            from,
            attempted: attempted.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A requested change to a learner's progress.
#[derive(Debug, Clone)]
pub enum Transition {
    /// A diagnosed calibration submission.
    CalibrationStep {
        diagnosis: DiagnosisResult,
        idempotency_key: Option<String>,
        word_claim: Option<WordClaim>,
    },
    /// A diagnosed practice submission and the action decided for it.
    PracticeOutcome {
        diagnosis: DiagnosisResult,
        action: Action,
        idempotency_key: Option<String>,
        word_claim: Option<WordClaim>,
    },
    /// Take over selection of the next word for a learner already
    /// `awaiting_word`.
    ClaimWord { claim: WordClaim },
    /// A new target word was obtained.
    ReplaceWord { word: PracticeWord },
    /// Administrative restart of calibration.
    AdminReset { first_word: Option<PracticeWord> },
}

impl Transition {
    fn name(&self) -> &'static str {
        match self {
            Transition::CalibrationStep { .. } => "calibration step",
            Transition::PracticeOutcome { .. } => "practice outcome",
            Transition::ClaimWord { .. } => "word claim",
            Transition::ReplaceWord { .. } => "word replacement",
            Transition::AdminReset { .. } => "calibration reset",
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressionMachine
// ---------------------------------------------------------------------------

/// Applies [`Transition`]s under a fixed calibration policy.
#[derive(Debug, Clone, Default)]
pub struct ProgressionMachine {
    calibration: CalibrationConfig,
}

impl ProgressionMachine {
    pub fn new(calibration: CalibrationConfig) -> Self {
        Self { calibration }
    }

    /// Apply `transition` to `progress`, returning the successor record.
    pub fn apply(
        &self,
        progress: &LearnerProgress,
        transition: Transition,
    ) -> Result<LearnerProgress, ProgressionError> {
        let name = transition.name();
        let mut next = progress.clone();
        let mut entry = HistoryEntry {
            recorded_at: Utc::now(),
            event: HistoryEvent::WordReplaced,
            snapshot: progress.snapshot(),
            diagnosis: None,
            action: None,
            idempotency_key: None,
        };

        match transition {
            Transition::CalibrationStep {
                diagnosis,
                idempotency_key,
                word_claim,
            } => {
                let step = progress.calibration_index;
                let in_sequence = usize::from(step) == progress.calibration_samples.len() + 1;
                if progress.mode != Mode::Calibration
                    || !(1..=CALIBRATION_STEPS).contains(&step)
                    || !in_sequence
                {
                    return Err(ProgressionError::invalid(progress, name));
                }

                next.calibration_samples.push(CalibrationSample {
                    step,
                    error_count: diagnosis.error_count,
                    phoneme_count: diagnosis.phoneme_count,
                });
                next.cur_err = Some(diagnosis.error_count);

                if step < CALIBRATION_STEPS {
                    next.calibration_index = step + 1;
                    next.cur_lvl = calibration_band(step + 1);
                    entry.event = HistoryEvent::CalibrationStep;
                    log::debug!(
                        "progression: {} calibration {} -> {}",
                        progress.learner_id,
                        step,
                        step + 1
                    );
                } else {
                    let level =
                        suggest_level(&next.calibration_samples, self.calibration.max_error_rate);
                    next.mode = Mode::Practice;
                    next.suggested_level = Some(level);
                    next.cur_lvl = level;
                    next.consecutive_success_streak = 0;
                    next.consecutive_failure_streak = 0;
                    entry.event = HistoryEvent::CalibrationCompleted;
                    log::info!(
                        "progression: {} finished calibration, suggested level {}",
                        progress.learner_id,
                        level
                    );
                }

                next.awaiting_word = true;
                next.word_claim = word_claim;
                entry.action = Some(Action::Continue);
                entry.diagnosis = Some(diagnosis);
                entry.idempotency_key = idempotency_key;
            }

            Transition::PracticeOutcome {
                diagnosis,
                action,
                idempotency_key,
                word_claim,
            } => {
                if progress.mode != Mode::Practice {
                    return Err(ProgressionError::invalid(progress, name));
                }

                match action {
                    Action::Continue => {
                        next.consecutive_success_streak += 1;
                        next.consecutive_failure_streak = 0;
                    }
                    Action::Repeat => {
                        next.consecutive_failure_streak += 1;
                        next.consecutive_success_streak = 0;
                    }
                    Action::Advance | Action::Regress => {
                        let target = if action == Action::Advance {
                            progress.cur_lvl.next()
                        } else {
                            progress.cur_lvl.prev()
                        };
                        let Some(level) = target else {
                            return Err(ProgressionError::invalid(
                                progress,
                                format!("{action:?} beyond band limits"),
                            ));
                        };
                        log::debug!(
                            "progression: {} {:?} {} -> {}",
                            progress.learner_id,
                            action,
                            progress.cur_lvl,
                            level
                        );
                        next.cur_lvl = level;
                        next.consecutive_success_streak = 0;
                        next.consecutive_failure_streak = 0;
                    }
                }

                if action.needs_new_word() {
                    next.awaiting_word = true;
                    next.word_claim = word_claim;
                }
                next.cur_err = Some(diagnosis.error_count);
                entry.event = HistoryEvent::PracticeAttempt;
                entry.action = Some(action);
                entry.diagnosis = Some(diagnosis);
                entry.idempotency_key = idempotency_key;
            }

            Transition::ClaimWord { claim } => {
                if !progress.awaiting_word {
                    return Err(ProgressionError::invalid(progress, name));
                }
                next.word_claim = Some(claim);
                entry.event = HistoryEvent::WordClaimed;
            }

            Transition::ReplaceWord { word } => {
                next.cur_word = Some(word);
                next.awaiting_word = false;
                next.word_claim = None;
                entry.event = HistoryEvent::WordReplaced;
            }

            Transition::AdminReset { first_word } => {
                next.mode = Mode::Calibration;
                next.calibration_index = 1;
                next.cur_lvl = calibration_band(1);
                next.suggested_level = None;
                next.consecutive_success_streak = 0;
                next.consecutive_failure_streak = 0;
                next.calibration_samples.clear();
                next.cur_err = None;
                next.awaiting_word = first_word.is_none();
                next.word_claim = None;
                next.cur_word = first_word;
                entry.event = HistoryEvent::CalibrationReset;
                log::info!("progression: {} calibration reset", progress.learner_id);
            }
        }

        next.history.push(entry);
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
