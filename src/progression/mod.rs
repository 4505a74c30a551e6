//! Calibration / practice progression.
//!
//! * [`level`]: difficulty bands and the step → band mapping.
//! * [`state`]: the persisted [`LearnerProgress`] record and projections.
//! * [`calibration`]: turning 20 calibration samples into a starting band.
//! * [`machine`]: the only code path that changes a [`LearnerProgress`].

pub mod calibration;
pub mod level;
pub mod machine;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use calibration::{band_error_rates, suggest_level};
pub use level::{band_index, calibration_band, DifficultyLevel, CALIBRATION_STEPS};
pub use machine::{ProgressionError, ProgressionMachine, Transition};
pub use state::{
    current_band, current_item, Action, CalibrationSample, CurrentItem, HistoryEntry,
    HistoryEvent, LearnerProgress, Mode, PracticeWord, ProgressSnapshot, WordClaim,
};
