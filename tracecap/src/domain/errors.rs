//! Structured error types for the session machinery.
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Instrument hooks themselves return `anyhow::Result` so implementations
//! can attach whatever context they like; the coordinator wraps the first
//! failure per phase into [`SessionError::Instrument`].

use super::types::Phase;
use thiserror::Error;
use tracecap_capture::CaptureError;

/// Failure to obtain privileged access before recording.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("system control channel unavailable: {0}")]
    Connect(#[source] std::io::Error),

    #[error("policy request rejected: {0}")]
    Denied(String),
}

/// Terminal failure of one recording session, surfaced from
/// [`Recording::wait`](crate::session::Recording::wait).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to acquire recording policy: {0}")]
    Policy(#[from] PolicyError),

    // `cause` rather than `source`: instrument hooks hand back anyhow
    // errors, which cannot sit in a thiserror source chain directly.
    #[error("instrument {instrument} failed during {phase}: {cause:#}")]
    Instrument { instrument: String, phase: Phase, cause: anyhow::Error },

    #[error("failed to spawn {command}: {source}")]
    Spawn { command: String, #[source] source: std::io::Error },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("recording driver failed: {0}")]
    Driver(String),
}
