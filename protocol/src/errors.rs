//! Closed error taxonomy for the secure-messaging core.
//!
//! `spec.md` REDESIGN FLAGS call for replacing sentinel errors wrapped in
//! formatted strings with a closed enum of kinds carrying an optional
//! human-readable detail. [`CoreError`] is that enum; every crate in the
//! workspace converts its primitive errors into one of these kinds rather
//! than inventing a new error type per module.

use std::fmt::{Display, Formatter};

/// One of the error kinds named in the spec's error handling design.
/// Callers match on kind, not on the wrapped detail string.
#[derive(Debug)]
pub enum CoreError {
    /// Malformed or over-size input (failed integrity/size checks).
    Validation(String),

    /// Signature, sender-binding, or timestamp check failed.
    Security(String),

    /// HKDF/AEAD failure, or a post-quantum primitive rejected its input.
    Crypto(String),

    /// Ratchet not initialized, room not ready, chain jump too large.
    State(String),

    /// Local database unavailable, or the write queue is full.
    Storage(String),

    /// Unexpected response type, missing topic, or an unrecognized
    /// envelope `type` tag.
    Protocol(String),

    /// Auth row or peer directory entry absent.
    NotFound(String),

    /// A bounded wait (catch-up response, queue drain) ran out of time.
    Timeout(String),
}

impl CoreError {
    pub fn validation(detail: impl Into<String>) -> Self {
        CoreError::Validation(detail.into())
    }

    pub fn security(detail: impl Into<String>) -> Self {
        CoreError::Security(detail.into())
    }

    pub fn crypto(detail: impl Into<String>) -> Self {
        CoreError::Crypto(detail.into())
    }

    pub fn state(detail: impl Into<String>) -> Self {
        CoreError::State(detail.into())
    }

    pub fn storage(detail: impl Into<String>) -> Self {
        CoreError::Storage(detail.into())
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        CoreError::Protocol(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        CoreError::NotFound(detail.into())
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        CoreError::Timeout(detail.into())
    }

    /// True for the two kinds the validation pipeline (spec §4.G) may
    /// produce on steps 1-2.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// True for the kind the validation pipeline (spec §4.G) produces on
    /// steps 3-5; these are always surfaced, per the propagation policy.
    pub fn is_security(&self) -> bool {
        matches!(self, CoreError::Security(_))
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Validation(d) => write!(f, "validation error: {}", d),
            CoreError::Security(d) => write!(f, "security error: {}", d),
            CoreError::Crypto(d) => write!(f, "crypto error: {}", d),
            CoreError::State(d) => write!(f, "state error: {}", d),
            CoreError::Storage(d) => write!(f, "storage error: {}", d),
            CoreError::Protocol(d) => write!(f, "protocol error: {}", d),
            CoreError::NotFound(d) => write!(f, "not found: {}", d),
            CoreError::Timeout(d) => write!(f, "timeout: {}", d),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<hkdf::InvalidLength> for CoreError {
    fn from(value: hkdf::InvalidLength) -> Self {
        CoreError::crypto(format!("invalid HKDF length: {}", value))
    }
}

impl From<chacha20poly1305::Error> for CoreError {
    fn from(_value: chacha20poly1305::Error) -> Self {
        CoreError::crypto("AEAD seal/open failed")
    }
}

impl From<base64::DecodeError> for CoreError {
    fn from(value: base64::DecodeError) -> Self {
        CoreError::validation(format!("invalid base64: {}", value))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(value: serde_json::Error) -> Self {
        CoreError::validation(format!("invalid JSON: {}", value))
    }
}
