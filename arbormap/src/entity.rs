//! Point entities rendered as map markers.
//!
//! A [`PointEntity`] is a surveyed tree (or any other domain object with a
//! position). Entities are supplied by the surrounding application and are
//! never mutated by the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// Stable identity of a point entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A domain object with a geographic position.
///
/// Deserializes from the tree payload served by the inventory API:
///
/// ```json
/// { "id": 7, "lat": 35.68, "lng": 139.76, "type": "Cedar", "lidar_url": null }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEntity {
    pub id: EntityId,
    pub lat: f64,
    pub lng: f64,
    /// Human-readable kind, e.g. the tree species.
    #[serde(rename = "type")]
    pub label: String,
    /// Optional attachment reference (a LiDAR scan URL for trees).
    #[serde(rename = "lidar_url", default)]
    pub auxiliary: Option<String>,
}

impl PointEntity {
    pub fn new(id: impl Into<EntityId>, lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lat,
            lng,
            label: label.into(),
            auxiliary: None,
        }
    }

    /// Attach an auxiliary reference.
    pub fn with_auxiliary(mut self, auxiliary: impl Into<String>) -> Self {
        self.auxiliary = Some(auxiliary.into());
        self
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Marker title shown on hover: `"{label} (ID: {id})"`.
    pub fn title(&self) -> String {
        format!("{} (ID: {})", self.label, self.id)
    }
}
