//! Location acquisition
//!
//! Two independent sessions run over one [`PositioningProvider`]:
//!
//! - **One-shot** ("locate me"): each request resolves on its own; concurrent
//!   requests are not merged.
//! - **Continuous** ("track me"): a single watch registration that is
//!   released exactly once, on stop, on error, or on teardown.
//!
//! Provider failures are normalized into [`LocationError`].

mod error;
mod manager;
mod provider;
mod scripted;
mod session;

pub use error::{LocationError, PositionError, PositionErrorCode};
pub use manager::{LocationEvent, LocationSessionManager, TrackingRequest, USER_MARKER_TITLE};
pub use provider::{
    Fix, PositionOptions, PositioningProvider, WatchCallback, WatchToken, ACQUISITION_TIMEOUT,
    CONTINUOUS_MAX_AGE, ONE_SHOT_MAX_AGE,
};
pub use scripted::ScriptedPositioning;
pub use session::{LocationSession, SessionMode, SessionStatus};
