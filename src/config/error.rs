//! Error types and result aliases.
//!
//! Defines the core `CaptchaError` enumeration and common `Result` type.
//! Validation outcomes (`InvalidCode`, `CodeExpired`) are not errors; see
//! [`crate::captcha::ValidationResult`].

use thiserror::Error;

/// CAPTCHA-specific errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptchaError {
    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Validation requested before any code was generated.
    #[error("no code has been generated yet; call refresh first")]
    NotInitialized,

    /// No surface to rasterize into, or the bitmap could not be produced.
    #[error("rendering unavailable: {0}")]
    RenderingUnavailable(String),

    /// Operation on a controller that has already been disposed.
    #[error("captcha controller has been disposed")]
    Disposed,
}

impl CaptchaError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

/// Result type alias for `CaptchaError`.
pub type Result<T> = std::result::Result<T, CaptchaError>;
