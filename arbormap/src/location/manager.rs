//! Location session manager.
//!
//! Runs the one-shot and continuous acquisition state machines over a single
//! [`PositioningProvider`] and owns the user-position marker.
//!
//! The manager never awaits. Asynchronous operations are split into a
//! `begin`/`complete` (one-shot) or `prepare`/`attach`/`handle` (continuous)
//! pair so the owner can release its lock while the provider works.
//!
//! # Subscription Safety
//!
//! Every watch registration is tagged with a generation number. Stopping,
//! failing or tearing down bumps the generation, so:
//! - updates from a released watch are discarded
//! - a token that arrives after its session already ended is cleared at once
//!
//! At most one watch token is held at any time.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use super::error::{LocationError, PositionError};
use super::provider::{Fix, PositionOptions, PositioningProvider, WatchToken};
use super::session::{LocationSession, SessionMode, SessionStatus};
use crate::display::{
    DisplayError, MapProvider, MarkerHandle, MarkerIcon, MarkerSpec, MarkerTag, SurfaceAdapter,
};
use crate::error::EngineError;
use crate::geo::LatLng;

/// Title of the user-position marker.
pub const USER_MARKER_TITLE: &str = "Current location";

/// Notifications produced by the location state machines.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    /// A fix was applied to the camera and user marker.
    Fix { mode: SessionMode, fix: Fix },
    /// Acquisition failed.
    Error {
        mode: SessionMode,
        error: LocationError,
    },
    /// The fix was valid but the user marker could not be placed.
    DisplayFailed(DisplayError),
    /// A watch registration is live.
    TrackingStarted(WatchToken),
    /// Tracking was stopped explicitly or by teardown.
    TrackingStopped { token: Option<WatchToken> },
}

/// A watch registration the owner must perform outside its lock.
pub struct TrackingRequest {
    pub generation: u64,
    pub options: PositionOptions,
    pub provider: Arc<dyn PositioningProvider>,
}

impl std::fmt::Debug for TrackingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingRequest")
            .field("generation", &self.generation)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct OneShotState {
    pending: usize,
    last: SessionStatus,
}

#[derive(Debug)]
struct TrackingState {
    status: SessionStatus,
    token: Option<WatchToken>,
    generation: u64,
}

/// Owner of both location sessions and the user marker.
pub struct LocationSessionManager {
    provider: Arc<dyn PositioningProvider>,
    focus_zoom: u8,
    one_shot: OneShotState,
    tracking: TrackingState,
    user_marker: Option<MarkerHandle>,
}

impl std::fmt::Debug for LocationSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSessionManager")
            .field("focus_zoom", &self.focus_zoom)
            .field("one_shot", &self.one_shot)
            .field("tracking", &self.tracking)
            .field("user_marker", &self.user_marker)
            .finish_non_exhaustive()
    }
}

impl LocationSessionManager {
    pub fn new(provider: Arc<dyn PositioningProvider>, focus_zoom: u8) -> Self {
        Self {
            provider,
            focus_zoom,
            one_shot: OneShotState {
                pending: 0,
                last: SessionStatus::Idle,
            },
            tracking: TrackingState {
                status: SessionStatus::Idle,
                token: None,
                generation: 0,
            },
            user_marker: None,
        }
    }

    // ------------------------------------------------------------------
    // One-shot
    // ------------------------------------------------------------------

    /// Start a one-shot request and return the provider future to await.
    ///
    /// Concurrent requests are independent; nothing is deduplicated.
    pub fn begin_locate(
        &mut self,
    ) -> Result<BoxFuture<'static, Result<Fix, PositionError>>, LocationError> {
        if !self.provider.is_supported() {
            warn!("Locate requested but geolocation is unsupported");
            return Err(LocationError::Unsupported);
        }
        self.one_shot.pending += 1;
        debug!(pending = self.one_shot.pending, "One-shot locate started");
        Ok(self.provider.current_position(PositionOptions::one_shot()))
    }

    /// Apply the outcome of a one-shot request.
    ///
    /// On success the user marker is created or moved, then the camera moves
    /// to the fix at the focus zoom. On failure neither is touched, and the
    /// camera stays put if the marker cannot be placed.
    pub fn complete_locate<M: MapProvider>(
        &mut self,
        adapter: &mut SurfaceAdapter<M>,
        outcome: Result<Fix, PositionError>,
    ) -> Result<Fix, EngineError> {
        self.one_shot.pending = self.one_shot.pending.saturating_sub(1);

        let fix = match validated(outcome) {
            Ok(fix) => fix,
            Err(kind) => {
                warn!(error = %kind, "One-shot locate failed");
                self.one_shot.last = SessionStatus::Failed(kind);
                return Err(kind.into());
            }
        };

        // Active is transient for one-shot sessions.
        self.one_shot.last = SessionStatus::Idle;
        self.place_user_marker(adapter, fix.position)?;
        adapter.set_center(fix.position, self.focus_zoom)?;
        info!(position = %fix.position, accuracy_m = ?fix.accuracy_m, "Located user");
        Ok(fix)
    }

    /// Forget a one-shot request whose result will never be applied.
    pub fn abandon_locate(&mut self) {
        self.one_shot.pending = self.one_shot.pending.saturating_sub(1);
    }

    // ------------------------------------------------------------------
    // Continuous
    // ------------------------------------------------------------------

    /// Move to `Acquiring` and describe the watch to register.
    ///
    /// Returns `Ok(None)` if a watch is already live (idempotent start).
    pub fn prepare_tracking(&mut self) -> Result<Option<TrackingRequest>, LocationError> {
        if self.tracking.status.is_live() {
            debug!(token = ?self.tracking.token, "Tracking already live, ignoring start");
            return Ok(None);
        }
        if !self.provider.is_supported() {
            warn!("Tracking requested but geolocation is unsupported");
            return Err(LocationError::Unsupported);
        }
        self.tracking.generation += 1;
        self.tracking.status = SessionStatus::Acquiring;
        self.tracking.token = None;
        Ok(Some(TrackingRequest {
            generation: self.tracking.generation,
            options: PositionOptions::continuous(),
            provider: Arc::clone(&self.provider),
        }))
    }

    /// Record the token of a registered watch.
    ///
    /// If the session for `generation` already ended (stopped, failed, or a
    /// newer one started) the token is released immediately and `None` is
    /// returned.
    pub fn attach_watch(&mut self, generation: u64, token: WatchToken) -> Option<LocationEvent> {
        if generation == self.tracking.generation && self.tracking.status.is_live() {
            info!(%token, "Tracking started");
            self.tracking.token = Some(token);
            Some(LocationEvent::TrackingStarted(token))
        } else {
            debug!(%token, generation, "Session ended before registration completed, releasing");
            self.provider.clear_watch(token);
            None
        }
    }

    /// Apply a watch update delivered by the provider.
    ///
    /// Updates for stale generations are dropped. An error releases the
    /// watch before it is reported.
    pub fn handle_watch_update<M: MapProvider>(
        &mut self,
        adapter: &mut SurfaceAdapter<M>,
        generation: u64,
        outcome: Result<Fix, PositionError>,
    ) -> Option<LocationEvent> {
        if generation != self.tracking.generation || !self.tracking.status.is_live() {
            debug!(generation, "Dropping update from released watch");
            return None;
        }

        match validated(outcome) {
            Ok(fix) => {
                self.tracking.status = SessionStatus::Active;
                if let Err(e) = self.place_user_marker(adapter, fix.position) {
                    warn!(error = %e, "Could not place user marker");
                    return Some(LocationEvent::DisplayFailed(e));
                }
                if let Err(e) = adapter.pan_to(fix.position) {
                    return Some(LocationEvent::DisplayFailed(e));
                }
                debug!(position = %fix.position, "Tracking tick");
                Some(LocationEvent::Fix {
                    mode: SessionMode::Continuous,
                    fix,
                })
            }
            Err(kind) => {
                let token = self.release_watch();
                self.tracking.status = SessionStatus::Failed(kind);
                warn!(error = %kind, token = ?token, "Tracking failed, watch released");
                Some(LocationEvent::Error {
                    mode: SessionMode::Continuous,
                    error: kind,
                })
            }
        }
    }

    /// Stop tracking. A no-op when no watch is live.
    pub fn stop_tracking(&mut self) -> Option<LocationEvent> {
        if !self.tracking.status.is_live() {
            return None;
        }
        let token = self.release_watch();
        self.tracking.status = SessionStatus::Idle;
        info!(token = ?token, "Tracking stopped");
        Some(LocationEvent::TrackingStopped { token })
    }

    /// Release the watch token, if any, and invalidate the generation.
    fn release_watch(&mut self) -> Option<WatchToken> {
        self.tracking.generation += 1;
        let token = self.tracking.token.take();
        if let Some(token) = token {
            self.provider.clear_watch(token);
        }
        token
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    fn place_user_marker<M: MapProvider>(
        &mut self,
        adapter: &mut SurfaceAdapter<M>,
        position: LatLng,
    ) -> Result<(), DisplayError> {
        match self.user_marker.as_mut() {
            Some(handle) => adapter.set_marker_position(handle, position),
            None => {
                let spec = MarkerSpec::new(position, USER_MARKER_TITLE, MarkerIcon::UserLocation);
                self.user_marker = Some(adapter.add_marker(&spec, MarkerTag::UserLocation)?);
            }
        }
        Ok(())
    }

    /// Stop tracking and remove the user marker.
    pub fn shutdown<M: MapProvider>(
        &mut self,
        adapter: &mut SurfaceAdapter<M>,
    ) -> Option<LocationEvent> {
        let stopped = self.stop_tracking();
        if let Some(handle) = self.user_marker.take() {
            adapter.remove_marker(handle);
        }
        stopped
    }

    pub fn one_shot_session(&self) -> LocationSession {
        LocationSession {
            mode: SessionMode::OneShot,
            status: if self.one_shot.pending > 0 {
                SessionStatus::Acquiring
            } else {
                self.one_shot.last
            },
            subscription: None,
        }
    }

    pub fn tracking_session(&self) -> LocationSession {
        LocationSession {
            mode: SessionMode::Continuous,
            status: self.tracking.status,
            subscription: self.tracking.token,
        }
    }

    pub fn pending_locates(&self) -> usize {
        self.one_shot.pending
    }

    pub fn user_marker(&self) -> Option<&MarkerHandle> {
        self.user_marker.as_ref()
    }
}

/// Normalize a provider outcome, rejecting fixes with invalid coordinates.
fn validated(outcome: Result<Fix, PositionError>) -> Result<Fix, LocationError> {
    let fix = outcome.map_err(LocationError::from)?;
    if let Err(e) = fix.position.validate() {
        warn!(error = %e, "Provider reported an invalid fix");
        return Err(LocationError::PositionUnavailable);
    }
    Ok(fix)
}
