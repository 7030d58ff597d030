//! Engine construction settings.

use std::sync::Arc;

use crate::entity::PointEntity;
use crate::geo::{LatLng, DEFAULT_CENTER, DEFAULT_FOCUS_ZOOM, DEFAULT_ZOOM};

/// Called with the entity whose marker was clicked.
pub type EntityClickHandler = Arc<dyn Fn(&PointEntity) + Send + Sync>;

/// Called with `(lat, lng)` of a click on empty map area.
pub type EmptyAreaClickHandler = Arc<dyn Fn(f64, f64) + Send + Sync>;

/// Settings passed to [`super::Engine::create`].
///
/// Without an entity click handler, marker clicks open an inline detail
/// popup instead. Without an empty-area handler, surface clicks are ignored.
#[derive(Clone)]
pub struct EngineConfig {
    /// Host container the surface is created in.
    pub container: String,
    pub initial_center: LatLng,
    pub initial_zoom: u8,
    /// Zoom applied when the camera jumps to a one-shot fix.
    pub focus_zoom: u8,
    pub on_entity_click: Option<EntityClickHandler>,
    pub on_empty_area_click: Option<EmptyAreaClickHandler>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("container", &self.container)
            .field("initial_center", &self.initial_center)
            .field("initial_zoom", &self.initial_zoom)
            .field("focus_zoom", &self.focus_zoom)
            .field("on_entity_click", &self.on_entity_click.is_some())
            .field("on_empty_area_click", &self.on_empty_area_click.is_some())
            .finish()
    }
}

impl EngineConfig {
    /// Defaults: Tokyo center, zoom 10, focus zoom 15, no handlers.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            initial_center: DEFAULT_CENTER,
            initial_zoom: DEFAULT_ZOOM,
            focus_zoom: DEFAULT_FOCUS_ZOOM,
            on_entity_click: None,
            on_empty_area_click: None,
        }
    }

    pub fn with_initial_center(mut self, center: LatLng) -> Self {
        self.initial_center = center;
        self
    }

    pub fn with_initial_zoom(mut self, zoom: u8) -> Self {
        self.initial_zoom = zoom;
        self
    }

    pub fn with_focus_zoom(mut self, zoom: u8) -> Self {
        self.focus_zoom = zoom;
        self
    }

    pub fn on_entity_click<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PointEntity) + Send + Sync + 'static,
    {
        self.on_entity_click = Some(Arc::new(handler));
        self
    }

    pub fn on_empty_area_click<F>(mut self, handler: F) -> Self
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        self.on_empty_area_click = Some(Arc::new(handler));
        self
    }
}
