//! Action selection for a diagnosed attempt.
//!
//! | Mode        | Outcome | Condition                                   | Action     |
//! |-------------|---------|---------------------------------------------|------------|
//! | Calibration | any     | –                                           | `Continue` |
//! | Practice    | success | success streak reaches `advance_after`, not top    | `Advance`  |
//! | Practice    | success | otherwise                                   | `Continue` |
//! | Practice    | failure | failure streak reaches `regress_after`, not bottom | `Regress`  |
//! | Practice    | failure | otherwise                                   | `Repeat`   |
//!
//! Streaks count *including* the attempt being decided.

use crate::config::ProgressionConfig;
use crate::diagnosis::DiagnosisResult;
use crate::progression::{Action, DifficultyLevel, LearnerProgress, Mode};

/// Whether `diagnosis` counts as a successful attempt.
pub fn is_success(diagnosis: &DiagnosisResult, config: &ProgressionConfig) -> bool {
    diagnosis.error_rate() <= config.success_max_error_rate
}

/// Decide what the learner does next.
pub fn decide(
    progress: &LearnerProgress,
    diagnosis: &DiagnosisResult,
    config: &ProgressionConfig,
) -> Action {
    if progress.mode == Mode::Calibration {
        return Action::Continue;
    }

    if is_success(diagnosis, config) {
        let streak = progress.consecutive_success_streak + 1;
        if streak >= config.advance_after.max(1) && progress.cur_lvl < DifficultyLevel::TOP {
            Action::Advance
        } else {
            Action::Continue
        }
    } else {
        let streak = progress.consecutive_failure_streak + 1;
        if streak >= config.regress_after.max(1) && progress.cur_lvl > DifficultyLevel::BOTTOM {
            Action::Regress
        } else {
            Action::Repeat
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::diagnose;

    fn practice(level: DifficultyLevel, success: u32, failure: u32) -> LearnerProgress {
        let mut p = LearnerProgress::new("alice", "en", None);
        p.mode = Mode::Practice;
        p.cur_lvl = level;
        p.consecutive_success_streak = success;
        p.consecutive_failure_streak = failure;
        p
    }

    fn good() -> DiagnosisResult {
        diagnose(&["kæt"], "kæt").unwrap()
    }

    fn bad() -> DiagnosisResult {
        diagnose(&["kæt"], "bæd").unwrap()
    }

    #[test]
    fn calibration_always_continues() {
        let p = LearnerProgress::new("alice", "en", None);
        let cfg = ProgressionConfig::default();
        assert_eq!(decide(&p, &good(), &cfg), Action::Continue);
        assert_eq!(decide(&p, &bad(), &cfg), Action::Continue);
    }

    #[test]
    fn success_below_threshold_continues() {
        let cfg = ProgressionConfig::default();
        let p = practice(DifficultyLevel::Elementary, 1, 0);
        assert_eq!(decide(&p, &good(), &cfg), Action::Continue);
    }

    #[test]
    fn success_reaching_threshold_advances() {
        let cfg = ProgressionConfig::default();
        let p = practice(DifficultyLevel::Elementary, 2, 0);
        assert_eq!(decide(&p, &good(), &cfg), Action::Advance);
    }

    #[test]
    fn top_band_never_advances() {
        let cfg = ProgressionConfig::default();
        let p = practice(DifficultyLevel::Advanced, 10, 0);
        assert_eq!(decide(&p, &good(), &cfg), Action::Continue);
    }

    #[test]
    fn failure_below_threshold_repeats() {
        let cfg = ProgressionConfig::default();
        let p = practice(DifficultyLevel::Intermediate, 4, 0);
        assert_eq!(decide(&p, &bad(), &cfg), Action::Repeat);
    }

    #[test]
    fn failure_reaching_threshold_regresses() {
        let cfg = ProgressionConfig {
            regress_after: 2,
            ..ProgressionConfig::default()
        };
        let p = practice(DifficultyLevel::Intermediate, 0, 1);
        assert_eq!(decide(&p, &bad(), &cfg), Action::Regress);
    }

    #[test]
    fn bottom_band_never_regresses() {
        let cfg = ProgressionConfig::default();
        let p = practice(DifficultyLevel::Beginner, 0, 10);
        assert_eq!(decide(&p, &bad(), &cfg), Action::Repeat);
    }

    #[test]
    fn tolerance_turns_minor_errors_into_success() {
        let cfg = ProgressionConfig {
            success_max_error_rate: 0.34,
            ..ProgressionConfig::default()
        };
        let one_error = diagnose(&["kæt"], "kæd").unwrap();
        assert!(is_success(&one_error, &cfg));
        assert!(!is_success(&one_error, &ProgressionConfig::default()));
    }
}
