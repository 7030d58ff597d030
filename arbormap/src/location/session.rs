//! Location session state.
//!
//! # State Machine
//!
//! ```text
//! Idle --start--> Acquiring --fix--> Active
//!                     |                |
//!                     +----error-------+--> Failed(kind)
//! ```
//!
//! A one-shot `Active` collapses straight back to `Idle` once its fix has been
//! applied. A continuous `Active` persists until stopped or failed.

use std::fmt;

use super::error::LocationError;
use super::provider::WatchToken;

/// Acquisition mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    OneShot,
    Continuous,
}

/// Status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Acquiring,
    Active,
    Failed(LocationError),
}

impl SessionStatus {
    /// Whether a session in this status holds (or is obtaining) a live
    /// provider registration.
    pub fn is_live(&self) -> bool {
        matches!(self, SessionStatus::Acquiring | SessionStatus::Active)
    }

    /// Short label for status displays.
    pub fn display_status(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Acquiring => "Locating...",
            SessionStatus::Active => "Tracking",
            SessionStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Failed(kind) => write!(f, "Failed ({})", kind),
            other => f.write_str(other.display_status()),
        }
    }
}

/// Point-in-time view of a location session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSession {
    pub mode: SessionMode,
    pub status: SessionStatus,
    /// Live watch registration (continuous mode only).
    pub subscription: Option<WatchToken>,
}
