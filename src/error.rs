//! Service-level error type.
//!
//! Module errors ([`DiagnosisError`], [`ProgressionError`], [`GatewayError`],
//! [`StoreError`]) convert into [`CoachError`] with `?`.  Each kind has one
//! fixed learner-facing message ([`CoachError::user_message`]); the
//! `Display` text is for logs and operators.

use thiserror::Error;

use crate::diagnosis::DiagnosisError;
use crate::gateway::GatewayError;
use crate::progression::ProgressionError;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoachError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot apply {attempted} while in {from}")]
    InvalidStateTransition { from: String, attempted: String },

    #[error("secret {0} is not configured")]
    SecretMissing(String),

    #[error("speech service returned HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("speech service timed out")]
    Timeout,

    /// Another request for the same learner is still running.
    #[error("learner {0:?} has a request in flight")]
    Busy(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("progress for learner {0:?} changed concurrently")]
    VersionConflict(String),

    #[error("unknown learner {0:?}")]
    UnknownLearner(String),

    #[error("speech service unreachable: {0}")]
    Transport(String),

    #[error("progress storage failed: {0}")]
    Storage(String),
}

impl CoachError {
    /// Stable snake_case kind name for logs and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            CoachError::InvalidInput(_) => "invalid_input",
            CoachError::InvalidStateTransition { .. } => "invalid_state_transition",
            CoachError::SecretMissing(_) => "secret_missing",
            CoachError::UpstreamError { .. } => "upstream_error",
            CoachError::Timeout => "timeout",
            CoachError::Busy(_) => "busy",
            CoachError::Cancelled => "cancelled",
            CoachError::VersionConflict(_) => "version_conflict",
            CoachError::UnknownLearner(_) => "unknown_learner",
            CoachError::Transport(_) => "transport",
            CoachError::Storage(_) => "storage",
        }
    }

    /// Fixed message safe to show a learner.  Never contains secret names,
    /// upstream bodies or learner data.
    pub fn user_message(&self) -> &'static str {
        match self {
            CoachError::InvalidInput(_) => "The request was incomplete or malformed.",
            CoachError::InvalidStateTransition { .. } => {
                "That action is not available right now."
            }
            CoachError::SecretMissing(_) => {
                "The speech service is not configured. Please contact support."
            }
            CoachError::UpstreamError { .. } => {
                "The speech service could not process the request. Please try again."
            }
            CoachError::Timeout => "The speech service took too long to respond. Please try again.",
            CoachError::Busy(_) => "Your previous attempt is still being processed.",
            CoachError::Cancelled => "The request was cancelled.",
            CoachError::VersionConflict(_) => {
                "Your progress was updated elsewhere. Please reload and try again."
            }
            CoachError::UnknownLearner(_) => "No progress was found for this learner.",
            CoachError::Transport(_) => {
                "The speech service is unreachable. Please try again later."
            }
            CoachError::Storage(_) => "Your progress could not be saved. Please contact support.",
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<GatewayError> for CoachError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::InvalidInput(msg) => CoachError::InvalidInput(msg),
            GatewayError::SecretMissing(name) => CoachError::SecretMissing(name),
            GatewayError::Upstream { status, body } => CoachError::UpstreamError { status, body },
            // A 2xx with an unusable body is still the upstream's fault.
            GatewayError::MalformedResponse(msg) => CoachError::UpstreamError {
                status: 502,
                body: msg,
            },
            GatewayError::Timeout(_) => CoachError::Timeout,
            GatewayError::Transport(msg) => CoachError::Transport(msg),
            GatewayError::Cancelled => CoachError::Cancelled,
        }
    }
}

impl From<StoreError> for CoachError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => CoachError::UnknownLearner(id),
            StoreError::VersionConflict { learner_id, .. } => CoachError::VersionConflict(learner_id),
            StoreError::InvalidId(id) => CoachError::InvalidInput(format!("invalid learner id {id:?}")),
            other => CoachError::Storage(other.to_string()),
        }
    }
}

impl From<ProgressionError> for CoachError {
    fn from(e: ProgressionError) -> Self {
        match e {
            ProgressionError::InvalidStateTransition { from, attempted } => {
                CoachError::InvalidStateTransition { from, attempted }
            }
        }
    }
}

impl From<DiagnosisError> for CoachError {
    fn from(e: DiagnosisError) -> Self {
        CoachError::InvalidInput(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
