//! In-memory map provider.
//!
//! `HeadlessSurface` implements [`MapProvider`] without rendering anything. It
//! records every call as a [`SurfaceOp`] and tracks live markers, which makes
//! it the backing surface for scenario replay and for tests. Clones share
//! state, so a caller can hand one clone to the engine and inspect another.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::types::{DisplayError, MapProvider, MarkerSpec, NativeMarkerId, SurfaceId};
use crate::geo::{GeoBounds, LatLng};

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    CreateSurface {
        container: String,
        center: LatLng,
        zoom: u8,
    },
    ReleaseSurface(SurfaceId),
    CreateMarker {
        marker: NativeMarkerId,
        spec: MarkerSpec,
    },
    DestroyMarker(NativeMarkerId),
    MoveMarker {
        marker: NativeMarkerId,
        position: LatLng,
    },
    SetCenter(LatLng),
    SetZoom(u8),
    FitBounds(GeoBounds),
    OpenPopup {
        marker: NativeMarkerId,
        html: String,
    },
}

impl fmt::Display for SurfaceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceOp::CreateSurface {
                container,
                center,
                zoom,
            } => write!(f, "create_surface {} center={} zoom={}", container, center, zoom),
            SurfaceOp::ReleaseSurface(id) => write!(f, "release_surface #{}", id.0),
            SurfaceOp::CreateMarker { marker, spec } => write!(
                f,
                "create_marker {} {:?} \"{}\" at {}",
                marker, spec.icon, spec.title, spec.position
            ),
            SurfaceOp::DestroyMarker(marker) => write!(f, "destroy_marker {}", marker),
            SurfaceOp::MoveMarker { marker, position } => {
                write!(f, "move_marker {} to {}", marker, position)
            }
            SurfaceOp::SetCenter(center) => write!(f, "set_center {}", center),
            SurfaceOp::SetZoom(zoom) => write!(f, "set_zoom {}", zoom),
            SurfaceOp::FitBounds(b) => write!(
                f,
                "fit_bounds lat=[{}, {}] lng=[{}, {}]",
                b.min_lat, b.max_lat, b.min_lng, b.max_lng
            ),
            SurfaceOp::OpenPopup { marker, html } => write!(f, "open_popup {} {}", marker, html),
        }
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    ops: Vec<SurfaceOp>,
    next_id: u64,
    surfaces_created: usize,
    live_markers: BTreeMap<NativeMarkerId, MarkerSpec>,
    markers_created: usize,
    markers_destroyed: usize,
    invalid_destroys: usize,
    fail_surface: bool,
    fail_next_markers: usize,
    center: Option<LatLng>,
    zoom: Option<u8>,
}

impl HeadlessState {
    fn issue_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording, non-rendering map provider.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next surface construction fail.
    pub fn fail_surface_creation(&self) {
        self.state.lock().fail_surface = true;
    }

    /// Make the next `count` marker constructions fail.
    pub fn fail_next_markers(&self, count: usize) {
        self.state.lock().fail_next_markers = count;
    }

    /// Every recorded call, oldest first.
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.state.lock().ops.clone()
    }

    /// Drain the recorded calls.
    pub fn take_ops(&self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.state.lock().ops)
    }

    pub fn surfaces_created(&self) -> usize {
        self.state.lock().surfaces_created
    }

    pub fn markers_created(&self) -> usize {
        self.state.lock().markers_created
    }

    pub fn markers_destroyed(&self) -> usize {
        self.state.lock().markers_destroyed
    }

    /// Destroy calls for markers that were not live. Always zero when the
    /// caller respects handle ownership.
    pub fn invalid_destroys(&self) -> usize {
        self.state.lock().invalid_destroys
    }

    pub fn live_marker_count(&self) -> usize {
        self.state.lock().live_markers.len()
    }

    /// Live markers with their current specs.
    pub fn live_markers(&self) -> Vec<(NativeMarkerId, MarkerSpec)> {
        self.state
            .lock()
            .live_markers
            .iter()
            .map(|(id, spec)| (*id, spec.clone()))
            .collect()
    }

    pub fn marker_position(&self, marker: NativeMarkerId) -> Option<LatLng> {
        self.state
            .lock()
            .live_markers
            .get(&marker)
            .map(|spec| spec.position)
    }

    /// Bounds passed to every `fit_bounds` call, oldest first.
    pub fn fit_calls(&self) -> Vec<GeoBounds> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::FitBounds(bounds) => Some(*bounds),
                _ => None,
            })
            .collect()
    }

    /// Current camera center, from surface creation or the last recenter.
    pub fn center(&self) -> Option<LatLng> {
        self.state.lock().center
    }

    /// Current zoom, from surface creation or the last recenter.
    pub fn zoom(&self) -> Option<u8> {
        self.state.lock().zoom
    }
}

impl MapProvider for HeadlessSurface {
    fn create_surface(
        &mut self,
        container: &str,
        center: LatLng,
        zoom: u8,
    ) -> Result<SurfaceId, DisplayError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_surface) {
            return Err(DisplayError::SurfaceCreation(format!(
                "container '{}' unavailable",
                container
            )));
        }
        let id = SurfaceId(state.issue_id());
        state.surfaces_created += 1;
        state.center = Some(center);
        state.zoom = Some(zoom);
        state.ops.push(SurfaceOp::CreateSurface {
            container: container.to_string(),
            center,
            zoom,
        });
        Ok(id)
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.state.lock().ops.push(SurfaceOp::ReleaseSurface(surface));
    }

    fn create_marker(
        &mut self,
        _surface: SurfaceId,
        spec: &MarkerSpec,
    ) -> Result<NativeMarkerId, DisplayError> {
        let mut state = self.state.lock();
        if state.fail_next_markers > 0 {
            state.fail_next_markers -= 1;
            return Err(DisplayError::MarkerCreation(format!(
                "provider rejected marker \"{}\"",
                spec.title
            )));
        }
        let marker = NativeMarkerId(state.issue_id());
        state.markers_created += 1;
        state.live_markers.insert(marker, spec.clone());
        state.ops.push(SurfaceOp::CreateMarker {
            marker,
            spec: spec.clone(),
        });
        Ok(marker)
    }

    fn destroy_marker(&mut self, marker: NativeMarkerId) {
        let mut state = self.state.lock();
        if state.live_markers.remove(&marker).is_some() {
            state.markers_destroyed += 1;
        } else {
            warn!(%marker, "Destroy requested for unknown marker");
            state.invalid_destroys += 1;
        }
        state.ops.push(SurfaceOp::DestroyMarker(marker));
    }

    fn move_marker(&mut self, marker: NativeMarkerId, position: LatLng) {
        let mut state = self.state.lock();
        if let Some(spec) = state.live_markers.get_mut(&marker) {
            spec.position = position;
        }
        state.ops.push(SurfaceOp::MoveMarker { marker, position });
    }

    fn set_center(&mut self, _surface: SurfaceId, center: LatLng) {
        let mut state = self.state.lock();
        state.center = Some(center);
        state.ops.push(SurfaceOp::SetCenter(center));
    }

    fn set_zoom(&mut self, _surface: SurfaceId, zoom: u8) {
        let mut state = self.state.lock();
        state.zoom = Some(zoom);
        state.ops.push(SurfaceOp::SetZoom(zoom));
    }

    fn fit_bounds(&mut self, _surface: SurfaceId, bounds: &GeoBounds) {
        self.state.lock().ops.push(SurfaceOp::FitBounds(*bounds));
    }

    fn open_popup(&mut self, _surface: SurfaceId, marker: NativeMarkerId, html: &str) {
        self.state.lock().ops.push(SurfaceOp::OpenPopup {
            marker,
            html: html.to_string(),
        });
    }
}
