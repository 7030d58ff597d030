//! Display surface boundary
//!
//! The engine never renders anything itself. It drives an external map SDK
//! through the narrow [`MapProvider`] capability, wrapped by a
//! [`SurfaceAdapter`] that owns the single lazily-created surface.
//!
//! # Architecture
//!
//! ```text
//! MarkerReconciler ──┐
//!                    ├──► SurfaceAdapter ──► MapProvider (SDK glue / HeadlessSurface)
//! LocationManager ───┘      (singleton surface, click handler)
//! ```
//!
//! Native click events flow back the other way as [`SurfaceEvent`]s which the
//! host forwards to [`crate::engine::Engine::dispatch`].

mod adapter;
mod headless;
mod popup;
mod types;

pub use adapter::SurfaceAdapter;
pub use headless::{HeadlessSurface, SurfaceOp};
pub use popup::DetailPopup;
pub use types::{
    DisplayError, MapProvider, MarkerHandle, MarkerIcon, MarkerSpec, MarkerTag, NativeMarkerId,
    SurfaceClickHandler, SurfaceEvent, SurfaceId,
};
