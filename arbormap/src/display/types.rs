//! Core types for the display surface boundary.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::entity::EntityId;
use crate::geo::{GeoBounds, GeoError, LatLng};

/// Identifier of a native map surface issued by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Identifier of a native marker issued by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeMarkerId(pub u64);

impl fmt::Display for NativeMarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// Errors raised while constructing native display objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisplayError {
    /// The provider failed to construct the map surface.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// The provider failed to construct a marker.
    #[error("Marker creation failed: {0}")]
    MarkerCreation(String),

    /// The marker position is not a valid coordinate.
    #[error("Invalid marker position: {0}")]
    InvalidPosition(#[from] GeoError),

    /// A marker operation was attempted before the surface exists.
    #[error("Display surface has not been created")]
    NoSurface,

    /// The surface was released during teardown and cannot be recreated.
    #[error("Display surface has been released")]
    SurfaceReleased,
}

/// Marker glyphs understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerIcon {
    /// Green tree glyph for point entities.
    Tree,
    /// Blue dot for the user's own position.
    UserLocation,
}

impl MarkerIcon {
    /// Rendered icon edge length in pixels.
    pub const SIZE_PX: u32 = 24;

    /// Raw SVG source for the icon.
    pub fn svg(&self) -> &'static str {
        match self {
            MarkerIcon::Tree => concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" "#,
                r#"fill="none" stroke="green" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">"#,
                r#"<path d="M12 2L8 8h8l-4-6z"/><path d="M12 8v12"/>"#,
                r#"<circle cx="12" cy="20" r="2" fill="brown"/></svg>"#
            ),
            MarkerIcon::UserLocation => concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" "#,
                r#"fill="none" stroke="blue" stroke-width="2" stroke-linecap="round" stroke-linejoin="round">"#,
                r#"<circle cx="12" cy="12" r="10" fill="lightblue" stroke="blue"/>"#,
                r#"<circle cx="12" cy="12" r="3" fill="blue"/></svg>"#
            ),
        }
    }

    /// The icon as an `image/svg+xml` data URL, percent-encoded.
    pub fn data_url(&self) -> String {
        let mut url = String::from("data:image/svg+xml;charset=UTF-8,");
        for byte in self.svg().bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*'
                | b'\'' | b'(' | b')' => url.push(byte as char),
                _ => url.push_str(&format!("%{:02X}", byte)),
            }
        }
        url
    }
}

/// Everything the provider needs to construct a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: LatLng,
    pub title: String,
    pub icon: MarkerIcon,
}

impl MarkerSpec {
    pub fn new(position: LatLng, title: impl Into<String>, icon: MarkerIcon) -> Self {
        Self {
            position,
            title: title.into(),
            icon,
        }
    }
}

/// What a marker represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerTag {
    /// Marker for the point entity with this id.
    Entity(EntityId),
    /// The single "my current position" marker.
    UserLocation,
}

/// Owned reference to a live native marker.
///
/// Deliberately not `Clone`: [`super::SurfaceAdapter::remove_marker`] consumes
/// the handle, so a marker cannot be destroyed twice.
#[derive(Debug, PartialEq)]
pub struct MarkerHandle {
    pub(crate) native: NativeMarkerId,
    pub(crate) tag: MarkerTag,
    pub(crate) position: LatLng,
}

impl MarkerHandle {
    pub fn native_id(&self) -> NativeMarkerId {
        self.native
    }

    pub fn tag(&self) -> MarkerTag {
        self.tag
    }

    /// Last position the marker was placed at.
    pub fn position(&self) -> LatLng {
        self.position
    }
}

/// Native click events forwarded from the map provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceEvent {
    /// Click on the map itself (not on a marker), resolved to a coordinate.
    SurfaceClicked(LatLng),
    /// Click on a marker.
    MarkerClicked(NativeMarkerId),
}

/// Handler for clicks that land on the surface rather than a marker.
pub type SurfaceClickHandler = Arc<dyn Fn(LatLng) + Send + Sync>;

/// Native map capability the engine drives.
///
/// Implementations wrap a concrete map SDK. Only construction can fail;
/// mutation of objects the provider already issued is infallible from the
/// engine's point of view.
pub trait MapProvider: Send {
    /// Construct the map surface inside `container`.
    fn create_surface(
        &mut self,
        container: &str,
        center: LatLng,
        zoom: u8,
    ) -> Result<SurfaceId, DisplayError>;

    /// Drop the provider's surface and any listeners attached to it.
    fn release_surface(&mut self, surface: SurfaceId);

    fn create_marker(
        &mut self,
        surface: SurfaceId,
        spec: &MarkerSpec,
    ) -> Result<NativeMarkerId, DisplayError>;

    fn destroy_marker(&mut self, marker: NativeMarkerId);

    fn move_marker(&mut self, marker: NativeMarkerId, position: LatLng);

    fn set_center(&mut self, surface: SurfaceId, center: LatLng);

    fn set_zoom(&mut self, surface: SurfaceId, zoom: u8);

    fn fit_bounds(&mut self, surface: SurfaceId, bounds: &GeoBounds);

    /// Show an info popup anchored at a marker.
    fn open_popup(&mut self, surface: SurfaceId, marker: NativeMarkerId, html: &str);
}

impl<T: MapProvider + ?Sized> MapProvider for Box<T> {
    fn create_surface(
        &mut self,
        container: &str,
        center: LatLng,
        zoom: u8,
    ) -> Result<SurfaceId, DisplayError> {
        (**self).create_surface(container, center, zoom)
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        (**self).release_surface(surface)
    }

    fn create_marker(
        &mut self,
        surface: SurfaceId,
        spec: &MarkerSpec,
    ) -> Result<NativeMarkerId, DisplayError> {
        (**self).create_marker(surface, spec)
    }

    fn destroy_marker(&mut self, marker: NativeMarkerId) {
        (**self).destroy_marker(marker)
    }

    fn move_marker(&mut self, marker: NativeMarkerId, position: LatLng) {
        (**self).move_marker(marker, position)
    }

    fn set_center(&mut self, surface: SurfaceId, center: LatLng) {
        (**self).set_center(surface, center)
    }

    fn set_zoom(&mut self, surface: SurfaceId, zoom: u8) {
        (**self).set_zoom(surface, zoom)
    }

    fn fit_bounds(&mut self, surface: SurfaceId, bounds: &GeoBounds) {
        (**self).fit_bounds(surface, bounds)
    }

    fn open_popup(&mut self, surface: SurfaceId, marker: NativeMarkerId, html: &str) {
        (**self).open_popup(surface, marker, html)
    }
}
