//! External speech service gateway.
//!
//! This module provides:
//! * [`SpeechBackend`]: async trait for recognition and word generation.
//! * [`HttpGateway`]: `reqwest` implementation with secrets, a bounded
//!   timeout, transport-only retries and cancellation.
//! * [`SecretStore`] / [`EnvSecretStore`] / [`MapSecretStore`]: where
//!   endpoints and the API key come from.
//! * [`wire`]: typed, validated request/response payloads.
//! * [`handler`]: the generation passthrough endpoint.
//! * [`GatewayError`]: error variants for gateway operations.

pub mod client;
pub mod handler;
pub mod secrets;
pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::HttpGateway;
pub use handler::{handle_generate, HttpReply};
pub use secrets::{EnvSecretStore, MapSecretStore, SecretStore};
pub use wire::{AudioClip, GeneratedWord, GenerationRequest, RecognitionResponse};

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the speech service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// A request argument was missing or malformed; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// The named secret is not configured.
    #[error("secret {0} is not configured")]
    SecretMissing(String),

    /// The service answered with a non-success status.
    #[error("speech service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The service answered 2xx but the payload failed validation.
    #[error("speech service returned a malformed response: {0}")]
    MalformedResponse(String),

    /// The request did not complete within the configured timeout.
    #[error("speech service request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure, after retries.
    #[error("speech service unreachable: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// SpeechBackend trait
// ---------------------------------------------------------------------------

/// Async trait for the two outbound speech capabilities.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn SpeechBackend>`).  Both calls are free of side
/// effects from the caller's point of view and must return
/// [`GatewayError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Transcribe `audio` into an IPA string.
    async fn recognize(
        &self,
        audio: &AudioClip,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;

    /// Ask for a new practice word.
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedWord, GatewayError>;
}
