//! Positioning provider capability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use super::error::PositionError;
use crate::geo::LatLng;

/// Provider-side timeout for every acquisition.
pub const ACQUISITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Cache tolerance for one-shot fixes.
pub const ONE_SHOT_MAX_AGE: Duration = Duration::from_secs(60);

/// Cache tolerance for continuous fixes.
pub const CONTINUOUS_MAX_AGE: Duration = Duration::from_secs(5);

/// Acquisition options passed to the provider.
///
/// These are fixed policy; callers of the engine cannot change them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub max_cache_age: Duration,
}

impl PositionOptions {
    /// Options for a single "locate me" request.
    pub fn one_shot() -> Self {
        Self {
            high_accuracy: true,
            timeout: ACQUISITION_TIMEOUT,
            max_cache_age: ONE_SHOT_MAX_AGE,
        }
    }

    /// Options for a continuous watch.
    pub fn continuous() -> Self {
        Self {
            high_accuracy: true,
            timeout: ACQUISITION_TIMEOUT,
            max_cache_age: CONTINUOUS_MAX_AGE,
        }
    }
}

/// A position fix reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: LatLng,
    /// Horizontal accuracy radius in meters, when known.
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            position: LatLng::new(lat, lng),
            accuracy_m: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy_m = Some(meters);
        self
    }
}

/// Opaque handle of a live watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchToken(pub u64);

impl fmt::Display for WatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Callback invoked by the provider for every watch update.
pub type WatchCallback = Arc<dyn Fn(Result<Fix, PositionError>) + Send + Sync>;

/// Platform positioning capability.
///
/// Mirrors the browser geolocation API: a one-shot request, a watch that
/// reports repeatedly through a callback, and explicit watch release.
pub trait PositioningProvider: Send + Sync {
    /// Whether any positioning capability exists at all.
    fn is_supported(&self) -> bool;

    /// Request a single fix.
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> BoxFuture<'static, Result<Fix, PositionError>>;

    /// Register a watch. The callback may run on any thread, and may run
    /// before this method returns.
    fn watch_position(&self, options: PositionOptions, callback: WatchCallback) -> WatchToken;

    /// Release a watch registration.
    fn clear_watch(&self, token: WatchToken);
}
