//! Geographic primitives
//!
//! Provides the WGS84 position type used for markers, camera targets and
//! location fixes, together with the incremental bounding box the engine
//! hands to the map provider when fitting the camera.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const MIN_LNG: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const MAX_LNG: f64 = 180.0;

/// Fallback map center used before any entity or fix is known (Tokyo).
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 35.6762,
    lng: 139.6503,
};

/// Initial zoom level for a freshly created surface.
pub const DEFAULT_ZOOM: u8 = 10;

/// Zoom level applied when the camera jumps to the user's own position.
pub const DEFAULT_FOCUS_ZOOM: u8 = 15;

/// Errors raised when validating geographic input.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeoError {
    #[error("Invalid latitude: {0} (must be within -90..=90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be within -180..=180)")]
    InvalidLongitude(f64),
}

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a position without validation.
    ///
    /// Use [`LatLng::try_new`] for caller-supplied values.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Create a position, rejecting non-finite or out-of-range values.
    pub fn try_new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        let pos = Self { lat, lng };
        pos.validate()?;
        Ok(pos)
    }

    /// Check that both coordinates are finite and within range.
    pub fn validate(&self) -> Result<(), GeoError> {
        if !self.lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&self.lat) {
            return Err(GeoError::InvalidLatitude(self.lat));
        }
        if !self.lng.is_finite() || !(MIN_LNG..=MAX_LNG).contains(&self.lng) {
            return Err(GeoError::InvalidLongitude(self.lng));
        }
        Ok(())
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Geographic bounding box, grown one point at a time.
///
/// Represents the minimum bounding rectangle containing every position passed
/// to [`GeoBounds::extend`]. Antimeridian wrapping is not handled; survey
/// areas are assumed to be regional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    /// Minimum (southernmost) latitude
    pub min_lat: f64,
    /// Maximum (northernmost) latitude
    pub max_lat: f64,
    /// Minimum (westernmost) longitude
    pub min_lng: f64,
    /// Maximum (easternmost) longitude
    pub max_lng: f64,
}

impl GeoBounds {
    /// Create a bounding box from a single point.
    pub fn from_point(pos: LatLng) -> Self {
        Self {
            min_lat: pos.lat,
            max_lat: pos.lat,
            min_lng: pos.lng,
            max_lng: pos.lng,
        }
    }

    /// Build the bounds of a set of positions.
    ///
    /// Returns `None` for an empty iterator; an empty set has no bounds.
    pub fn from_positions<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = positions.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for pos in iter {
            bounds.extend(pos);
        }
        Some(bounds)
    }

    /// Expand this bounding box to include a point.
    pub fn extend(&mut self, pos: LatLng) {
        self.min_lat = self.min_lat.min(pos.lat);
        self.max_lat = self.max_lat.max(pos.lat);
        self.min_lng = self.min_lng.min(pos.lng);
        self.max_lng = self.max_lng.max(pos.lng);
    }

    /// Whether the point lies inside (or on the edge of) the bounds.
    pub fn contains(&self, pos: LatLng) -> bool {
        (self.min_lat..=self.max_lat).contains(&pos.lat)
            && (self.min_lng..=self.max_lng).contains(&pos.lng)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Get the width of the bounds in degrees.
    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Get the height of the bounds in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_accepts_valid_position() {
        let pos = LatLng::try_new(35.68, 139.76).unwrap();
        assert_eq!(pos.lat, 35.68);
        assert_eq!(pos.lng, 139.76);
    }

    #[test]
    fn test_try_new_rejects_out_of_range() {
        assert_eq!(
            LatLng::try_new(91.0, 0.0),
            Err(GeoError::InvalidLatitude(91.0))
        );
        assert_eq!(
            LatLng::try_new(0.0, -180.5),
            Err(GeoError::InvalidLongitude(-180.5))
        );
    }

    #[test]
    fn test_try_new_rejects_nan() {
        assert!(matches!(
            LatLng::try_new(f64::NAN, 0.0),
            Err(GeoError::InvalidLatitude(_))
        ));
        assert!(LatLng::try_new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_bounds_from_empty_is_none() {
        assert!(GeoBounds::from_positions(Vec::new()).is_none());
    }

    #[test]
    fn test_bounds_single_point_is_degenerate() {
        let bounds = GeoBounds::from_positions([LatLng::new(35.0, 139.0)]).unwrap();
        assert_eq!(bounds.width(), 0.0);
        assert_eq!(bounds.height(), 0.0);
        assert_eq!(bounds.center(), LatLng::new(35.0, 139.0));
    }

    #[test]
    fn test_bounds_extend_covers_all_points() {
        let points = [
            LatLng::new(35.0, 139.0),
            LatLng::new(36.0, 140.0),
            LatLng::new(34.5, 139.5),
        ];
        let bounds = GeoBounds::from_positions(points).unwrap();

        assert_eq!(bounds.min_lat, 34.5);
        assert_eq!(bounds.max_lat, 36.0);
        assert_eq!(bounds.min_lng, 139.0);
        assert_eq!(bounds.max_lng, 140.0);
        for p in points {
            assert!(bounds.contains(p));
        }
        assert!(!bounds.contains(LatLng::new(37.0, 139.5)));
    }

    #[test]
    fn test_display_formats_six_decimals() {
        assert_eq!(
            LatLng::new(35.0, 139.0).to_string(),
            "(35.000000, 139.000000)"
        );
    }
}
