//! Alignment & diagnosis engine.
//!
//! Pure, synchronous and deterministic: no I/O, no shared state.  Safe to run
//! on any thread, one call per attempt.
//!
//! * [`tokenize`]: IPA string → phoneme tokens.
//! * [`align`]: minimum-edit-distance alignment of two token sequences.
//! * [`diagnose`]: best-candidate selection + [`DiagnosisResult`].
//!
//! # Quick start
//!
//! ```rust
//! use pronunciation_coach::diagnosis::{diagnose, ErrorCategory};
//!
//! let result = diagnose(&["θɪŋk"], "sɪŋk").unwrap();
//! assert_eq!(result.error_count, 1);
//! assert_eq!(result.error_summary[0].category, ErrorCategory::Substitution);
//! assert_eq!(result.focus_phoneme(), Some("θ"));
//! ```

pub mod align;
pub mod diagnose;
pub mod phonemes;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use align::{align, Alignment, EditOp};
pub use diagnose::{diagnose, Attempt, DiagnosisError, DiagnosisResult, ErrorCategory, ErrorDetail};
pub use phonemes::{tokenize, PhonemeClass};
