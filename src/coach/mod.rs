//! Decision and word-selection orchestration.
//!
//! This module provides:
//! * [`decide`]: the next [`Action`](crate::progression::Action) for a
//!   diagnosed attempt.
//! * [`WordPools`]: calibration lists and practice pools per language and
//!   band.
//! * [`CoachService`]: enrolment, submissions, projections and admin reset
//!   over a [`ProgressStore`](crate::store::ProgressStore) and a
//!   [`SpeechBackend`](crate::gateway::SpeechBackend).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pronunciation_coach::coach::{CoachService, WordPools};
//! use pronunciation_coach::config::AppConfig;
//! use pronunciation_coach::gateway::{AudioClip, EnvSecretStore, HttpGateway};
//! use pronunciation_coach::store::InMemoryProgressStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let gateway = HttpGateway::from_config(&config.gateway, Arc::new(EnvSecretStore));
//!     let coach = CoachService::new(
//!         &config,
//!         Arc::new(InMemoryProgressStore::new()),
//!         Arc::new(gateway),
//!         WordPools::builtin(),
//!     );
//!
//!     coach.enroll_learner("alice", "en").await.unwrap();
//!     let audio = AudioClip::new(std::fs::read("attempt.wav").unwrap(), "audio/wav");
//!     let outcome = coach.submit_attempt("alice", audio, "attempt-1").await.unwrap();
//!     println!("{} errors, next: {:?}", outcome.diagnosis.error_count, outcome.action);
//! }
//! ```

pub mod decision;
pub mod service;
pub mod words;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use decision::{decide, is_success};
pub use service::{CoachService, SubmitOutcome};
pub use words::{BandPool, WordEntry, WordPools};
