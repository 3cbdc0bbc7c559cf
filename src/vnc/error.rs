//! Error types for framebuffer decoding.

use thiserror::Error;

/// Errors returned by the framebuffer engine.
///
/// Every engine operation reports malformed input through one of these variants
/// instead of ignoring it. Whether an error is fatal for the session is up to the
/// protocol layer that drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// An update arrived before the server-init pixel format was registered.
    #[error("framebuffer not initialized: no pixel format registered")]
    NotInitialized,

    /// The rectangle is inverted or does not fit inside the framebuffer.
    #[error("invalid rectangle: {0}")]
    InvalidRectangle(String),

    /// The payload length does not match the rectangle area times the word size.
    #[error("pixel payload size mismatch: expected {expected} bytes, got {actual}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    /// The pixel format cannot be decoded (zero channel max, bad shift or depth).
    #[error("degenerate pixel format: {0}")]
    DegeneratePixelFormat(String),

    /// No session is registered under this id.
    #[error("unknown session {0}")]
    UnknownSession(u64),

    /// The engine feeding this reader has been dropped.
    #[error("session closed")]
    SessionClosed,
}

impl DecodeError {
    /// Stable integer code for this error kind, used across the JNI boundary.
    ///
    /// `0` is reserved for success.
    pub fn status_code(&self) -> i32 {
        match self {
            DecodeError::NotInitialized => 1,
            DecodeError::InvalidRectangle(_) => 2,
            DecodeError::PayloadSizeMismatch { .. } => 3,
            DecodeError::DegeneratePixelFormat(_) => 4,
            DecodeError::UnknownSession(_) => 5,
            DecodeError::SessionClosed => 6,
        }
    }
}

/// Result alias for framebuffer operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_and_nonzero() {
        let errors = [
            DecodeError::NotInitialized,
            DecodeError::InvalidRectangle("inverted corners".to_string()),
            DecodeError::PayloadSizeMismatch { expected: 2, actual: 1 },
            DecodeError::DegeneratePixelFormat("red max is zero".to_string()),
            DecodeError::UnknownSession(7),
            DecodeError::SessionClosed,
        ];
        let mut codes: Vec<i32> = errors.iter().map(DecodeError::status_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn messages_carry_geometry() {
        let err = DecodeError::PayloadSizeMismatch { expected: 8, actual: 6 };
        assert_eq!(err.to_string(), "pixel payload size mismatch: expected 8 bytes, got 6");
    }
}
