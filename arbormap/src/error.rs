//! Engine error types.

use thiserror::Error;

use crate::display::DisplayError;
use crate::location::LocationError;

/// Errors returned by the engine facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A native display object could not be constructed.
    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    /// Position acquisition failed.
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    /// The engine was destroyed before or during the call.
    #[error("Engine has been destroyed")]
    Destroyed,
}

impl EngineError {
    /// The location failure kind, if this is a location error.
    pub fn location_kind(&self) -> Option<LocationError> {
        match self {
            EngineError::Location(kind) => Some(*kind),
            _ => None,
        }
    }
}
