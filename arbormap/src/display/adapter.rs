//! Display surface adapter.
//!
//! Owns the single lazily-created map surface and is the only component that
//! talks to the [`MapProvider`]. Marker lifetimes are expressed through owned
//! [`MarkerHandle`]s handed back to callers.

use tracing::{debug, info};

use super::popup::DetailPopup;
use super::types::{
    DisplayError, MapProvider, MarkerHandle, MarkerSpec, MarkerTag, SurfaceClickHandler, SurfaceId,
};
use crate::geo::{GeoBounds, LatLng};

/// Lifecycle of the adapter's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceState {
    Uninitialized,
    Ready(SurfaceId),
    Released,
}

/// Thin wrapper over a [`MapProvider`] holding the singleton surface.
pub struct SurfaceAdapter<M> {
    provider: M,
    state: SurfaceState,
    surface_click: Option<SurfaceClickHandler>,
}

impl<M> std::fmt::Debug for SurfaceAdapter<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceAdapter")
            .field("state", &self.state)
            .field("has_surface_click", &self.surface_click.is_some())
            .finish_non_exhaustive()
    }
}

impl<M: MapProvider> SurfaceAdapter<M> {
    pub fn new(provider: M) -> Self {
        Self {
            provider,
            state: SurfaceState::Uninitialized,
            surface_click: None,
        }
    }

    /// Return the surface, creating it on first call.
    ///
    /// Idempotent: later calls return the existing surface and ignore the
    /// supplied center and zoom. Fails with [`DisplayError::SurfaceReleased`]
    /// after [`SurfaceAdapter::release`].
    pub fn ensure_surface(
        &mut self,
        container: &str,
        initial_center: LatLng,
        initial_zoom: u8,
    ) -> Result<SurfaceId, DisplayError> {
        match self.state {
            SurfaceState::Ready(surface) => Ok(surface),
            SurfaceState::Released => Err(DisplayError::SurfaceReleased),
            SurfaceState::Uninitialized => {
                initial_center.validate()?;
                let surface =
                    self.provider
                        .create_surface(container, initial_center, initial_zoom)?;
                info!(
                    container,
                    center = %initial_center,
                    zoom = initial_zoom,
                    "Display surface created"
                );
                self.state = SurfaceState::Ready(surface);
                Ok(surface)
            }
        }
    }

    /// The current surface, if one exists.
    pub fn surface(&self) -> Option<SurfaceId> {
        match self.state {
            SurfaceState::Ready(surface) => Some(surface),
            _ => None,
        }
    }

    fn require_surface(&self) -> Result<SurfaceId, DisplayError> {
        match self.state {
            SurfaceState::Ready(surface) => Ok(surface),
            SurfaceState::Uninitialized => Err(DisplayError::NoSurface),
            SurfaceState::Released => Err(DisplayError::SurfaceReleased),
        }
    }

    /// Construct a native marker.
    pub fn add_marker(
        &mut self,
        spec: &MarkerSpec,
        tag: MarkerTag,
    ) -> Result<MarkerHandle, DisplayError> {
        let surface = self.require_surface()?;
        spec.position.validate()?;
        let native = self.provider.create_marker(surface, spec)?;
        debug!(%native, ?tag, position = %spec.position, "Marker created");
        Ok(MarkerHandle {
            native,
            tag,
            position: spec.position,
        })
    }

    /// Destroy a native marker, consuming its handle.
    pub fn remove_marker(&mut self, handle: MarkerHandle) {
        debug!(native = %handle.native, tag = ?handle.tag, "Marker removed");
        self.provider.destroy_marker(handle.native);
    }

    /// Move an existing marker without recreating it.
    pub fn set_marker_position(&mut self, handle: &mut MarkerHandle, position: LatLng) {
        self.provider.move_marker(handle.native, position);
        handle.position = position;
    }

    /// Fit the camera around the given positions.
    ///
    /// Returns `false` (and leaves the camera alone) when there are no
    /// positions or no surface.
    pub fn fit_to_bounds<I>(&mut self, positions: I) -> bool
    where
        I: IntoIterator<Item = LatLng>,
    {
        let Some(surface) = self.surface() else {
            return false;
        };
        let Some(bounds) = GeoBounds::from_positions(positions) else {
            return false;
        };
        self.provider.fit_bounds(surface, &bounds);
        true
    }

    /// Move the camera to `position` at `zoom`.
    pub fn set_center(&mut self, position: LatLng, zoom: u8) -> Result<(), DisplayError> {
        let surface = self.require_surface()?;
        self.provider.set_center(surface, position);
        self.provider.set_zoom(surface, zoom);
        Ok(())
    }

    /// Pan the camera to `position` keeping the current zoom.
    pub fn pan_to(&mut self, position: LatLng) -> Result<(), DisplayError> {
        let surface = self.require_surface()?;
        self.provider.set_center(surface, position);
        Ok(())
    }

    /// Register the surface-level click handler, replacing any previous one.
    pub fn on_surface_click(&mut self, handler: Option<SurfaceClickHandler>) {
        self.surface_click = handler;
    }

    /// The currently registered surface click handler.
    pub fn surface_click_handler(&self) -> Option<SurfaceClickHandler> {
        self.surface_click.clone()
    }

    pub fn open_popup(&mut self, handle: &MarkerHandle, popup: &DetailPopup) {
        if let Some(surface) = self.surface() {
            self.provider
                .open_popup(surface, handle.native, &popup.to_html());
        }
    }

    /// Release the surface and every listener.
    ///
    /// Callers must remove their markers first. Calling this twice is a no-op.
    pub fn release(&mut self) {
        self.surface_click = None;
        if let SurfaceState::Ready(surface) = self.state {
            self.provider.release_surface(surface);
            info!("Display surface released");
        }
        self.state = SurfaceState::Released;
    }

    pub fn is_released(&self) -> bool {
        self.state == SurfaceState::Released
    }
}
