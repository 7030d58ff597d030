//! ArborMap - map annotation sync and live-location tracking
//!
//! This library keeps a native map surface in step with a collection of
//! geolocated point entities (trees in a field survey) and tracks the user's
//! own position on the same surface.
//!
//! # Modules
//!
//! - [`display`]: the [`display::MapProvider`] boundary and the singleton surface adapter
//! - [`reconciler`]: diff-based marker synchronization
//! - [`location`]: one-shot and continuous positioning sessions
//! - [`engine`]: the facade the host page talks to
//! - [`config`] / [`logging`]: INI configuration and tracing setup

pub mod config;
pub mod display;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geo;
pub mod location;
pub mod logging;
pub mod reconciler;

pub use engine::{ClickOutcome, Engine, EngineConfig};
pub use entity::{EntityId, PointEntity};
pub use error::EngineError;
pub use geo::LatLng;
