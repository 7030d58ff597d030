//! Positioning error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes a positioning provider can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl fmt::Display for PositionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionErrorCode::PermissionDenied => "PERMISSION_DENIED",
            PositionErrorCode::PositionUnavailable => "POSITION_UNAVAILABLE",
            PositionErrorCode::Timeout => "TIMEOUT",
        };
        f.write_str(name)
    }
}

/// Raw error as reported by the positioning provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct PositionError {
    pub code: PositionErrorCode,
    pub message: String,
}

impl PositionError {
    pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn permission_denied() -> Self {
        Self::new(PositionErrorCode::PermissionDenied, "User denied geolocation")
    }

    pub fn unavailable() -> Self {
        Self::new(
            PositionErrorCode::PositionUnavailable,
            "Position could not be determined",
        )
    }

    pub fn timeout() -> Self {
        Self::new(PositionErrorCode::Timeout, "Position acquisition timed out")
    }
}

/// Normalized location failure surfaced to callers.
///
/// All variants are recoverable; the caller decides whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    /// No positioning capability exists on this platform.
    #[error("Geolocation is not supported on this platform")]
    Unsupported,
}

impl From<PositionErrorCode> for LocationError {
    fn from(code: PositionErrorCode) -> Self {
        match code {
            PositionErrorCode::PermissionDenied => LocationError::PermissionDenied,
            PositionErrorCode::PositionUnavailable => LocationError::PositionUnavailable,
            PositionErrorCode::Timeout => LocationError::Timeout,
        }
    }
}

impl From<PositionError> for LocationError {
    fn from(err: PositionError) -> Self {
        err.code.into()
    }
}
