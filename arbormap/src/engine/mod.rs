//! Engine facade
//!
//! Composes the [`MarkerReconciler`] and [`LocationSessionManager`] over one
//! [`SurfaceAdapter`] and exposes the contract the surrounding page uses.
//!
//! # Concurrency
//!
//! [`Engine`] is a cheap-to-clone handle over shared state. All mutation is
//! serialized through one mutex, and the lock is never held while:
//! - awaiting the positioning provider
//! - registering a watch (providers may call back synchronously)
//! - running consumer click callbacks
//!
//! Watch callbacks hold only a weak reference, so dropping every handle tears
//! the engine down and releases any live watch even if
//! [`Engine::destroy`] was never called.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use arbormap::display::HeadlessSurface;
//! use arbormap::engine::{Engine, EngineConfig};
//! use arbormap::location::ScriptedPositioning;
//!
//! let config = EngineConfig::new("map").on_empty_area_click(|lat, lng| {
//!     println!("register a tree at {lat}, {lng}");
//! });
//! let engine = Engine::create(HeadlessSurface::new(), Arc::new(ScriptedPositioning::new()), config)?;
//!
//! engine.update_entities(trees)?;
//! let fix = engine.locate_once().await?;
//! engine.start_tracking()?;
//! engine.destroy();
//! ```

mod config;

pub use config::{EmptyAreaClickHandler, EngineConfig, EntityClickHandler};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::display::{
    DetailPopup, MapProvider, NativeMarkerId, SurfaceAdapter, SurfaceClickHandler, SurfaceEvent,
};
use crate::entity::{EntityId, PointEntity};
use crate::error::EngineError;
use crate::geo::LatLng;
use crate::location::{
    Fix, LocationEvent, LocationSession, LocationSessionManager, PositionError,
    PositioningProvider, SessionMode, SessionStatus, WatchCallback, WatchToken,
};
use crate::reconciler::{MarkerReconciler, ReconcileReport};

/// Capacity of the location event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a dispatched click resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// The empty-area handler ran with this position.
    EmptyArea(LatLng),
    /// The entity click handler ran for this entity.
    Entity(EntityId),
    /// A detail popup was opened for this entity.
    Popup(EntityId),
    /// Nothing handled the click.
    Ignored,
}

enum EntityClick {
    Handler(EntityClickHandler),
    DetailPopup,
}

struct EngineState {
    adapter: SurfaceAdapter<Box<dyn MapProvider>>,
    reconciler: MarkerReconciler,
    location: LocationSessionManager,
    entity_click: EntityClick,
    entities: Vec<PointEntity>,
    destroyed: bool,
}

impl EngineState {
    /// Release markers, the watch and the surface. Idempotent.
    fn teardown(&mut self) -> Option<LocationEvent> {
        if self.destroyed {
            return None;
        }
        self.destroyed = true;
        let markers = self.reconciler.clear(&mut self.adapter);
        let stopped = self.location.shutdown(&mut self.adapter);
        self.adapter.release();
        self.entities.clear();
        info!(markers, "Engine destroyed");
        stopped
    }
}

impl Drop for EngineState {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to a running annotation and tracking engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<EngineState>>,
    events: broadcast::Sender<LocationEvent>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Engine")
            .field("markers", &state.reconciler.len())
            .field("tracking", &state.location.tracking_session())
            .field("destroyed", &state.destroyed)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create the engine and its surface.
    ///
    /// The surface is created immediately inside `config.container`; the
    /// empty-area handler, if any, is registered on it.
    pub fn create<M>(
        map: M,
        positioning: Arc<dyn PositioningProvider>,
        config: EngineConfig,
    ) -> Result<Self, EngineError>
    where
        M: MapProvider + 'static,
    {
        let mut adapter: SurfaceAdapter<Box<dyn MapProvider>> = SurfaceAdapter::new(Box::new(map));
        adapter.ensure_surface(&config.container, config.initial_center, config.initial_zoom)?;

        if let Some(handler) = config.on_empty_area_click {
            let surface_click: SurfaceClickHandler = Arc::new(move |pos: LatLng| handler(pos.lat, pos.lng));
            adapter.on_surface_click(Some(surface_click));
        }

        let entity_click = match config.on_entity_click {
            Some(handler) => EntityClick::Handler(handler),
            None => EntityClick::DetailPopup,
        };

        let state = EngineState {
            adapter,
            reconciler: MarkerReconciler::new(),
            location: LocationSessionManager::new(positioning, config.focus_zoom),
            entity_click,
            entities: Vec::new(),
            destroyed: false,
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(Mutex::new(state)),
            events,
        })
    }

    /// Subscribe to location events (fixes, errors, tracking start/stop).
    pub fn subscribe(&self) -> broadcast::Receiver<LocationEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: Option<LocationEvent>) {
        publish(&self.events, event);
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Replace the entity collection and reconcile markers against it.
    pub fn update_entities(
        &self,
        entities: Vec<PointEntity>,
    ) -> Result<ReconcileReport, EngineError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.destroyed {
            return Err(EngineError::Destroyed);
        }
        state.entities = entities;
        Ok(state.reconciler.reconcile(&mut state.adapter, &state.entities)?)
    }

    /// Add a newly created entity to the current collection.
    ///
    /// An entity with the same id replaces the existing one.
    pub fn insert_entity(&self, entity: PointEntity) -> Result<ReconcileReport, EngineError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        if state.destroyed {
            return Err(EngineError::Destroyed);
        }
        debug!(id = %entity.id, "Entity created");
        match state.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => *existing = entity,
            None => state.entities.push(entity),
        }
        Ok(state.reconciler.reconcile(&mut state.adapter, &state.entities)?)
    }

    // ------------------------------------------------------------------
    // Location
    // ------------------------------------------------------------------

    /// Acquire one fix, center the camera on it and place the user marker.
    ///
    /// Every call is an independent request.
    pub async fn locate_once(&self) -> Result<Fix, EngineError> {
        let request = {
            let mut state = self.inner.lock();
            if state.destroyed {
                return Err(EngineError::Destroyed);
            }
            state.location.begin_locate()
        };
        let future = match request {
            Ok(future) => future,
            Err(error) => {
                self.publish(Some(LocationEvent::Error {
                    mode: SessionMode::OneShot,
                    error,
                }));
                return Err(error.into());
            }
        };

        let outcome = future.await;

        let result = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            if state.destroyed {
                state.location.abandon_locate();
                return Err(EngineError::Destroyed);
            }
            state.location.complete_locate(&mut state.adapter, outcome)
        };

        match &result {
            Ok(fix) => self.publish(Some(LocationEvent::Fix {
                mode: SessionMode::OneShot,
                fix: *fix,
            })),
            Err(EngineError::Location(error)) => self.publish(Some(LocationEvent::Error {
                mode: SessionMode::OneShot,
                error: *error,
            })),
            Err(_) => {}
        }
        result
    }

    /// Start continuous tracking. A no-op if tracking is already live.
    ///
    /// Errors reported by the provider after registration are delivered as
    /// [`LocationEvent::Error`]; an error reported during registration is
    /// also returned here.
    pub fn start_tracking(&self) -> Result<(), EngineError> {
        let prepared = {
            let mut state = self.inner.lock();
            if state.destroyed {
                return Err(EngineError::Destroyed);
            }
            state.location.prepare_tracking()
        };
        let request = match prepared {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(error) => {
                self.publish(Some(LocationEvent::Error {
                    mode: SessionMode::Continuous,
                    error,
                }));
                return Err(error.into());
            }
        };

        let generation = request.generation;
        let callback = watch_callback(Arc::downgrade(&self.inner), self.events.clone(), generation);
        let token = request.provider.watch_position(request.options, callback);

        let (attached, status) = {
            let mut state = self.inner.lock();
            let attached = state.location.attach_watch(generation, token);
            (attached, state.location.tracking_session().status)
        };

        match (attached, status) {
            (Some(event), _) => {
                self.publish(Some(event));
                Ok(())
            }
            (None, SessionStatus::Failed(kind)) => Err(kind.into()),
            (None, _) => Ok(()),
        }
    }

    /// Stop continuous tracking. A no-op if tracking is not live.
    pub fn stop_tracking(&self) {
        let event = self.inner.lock().location.stop_tracking();
        self.publish(event);
    }

    // ------------------------------------------------------------------
    // Clicks
    // ------------------------------------------------------------------

    /// Route a native click to exactly one consumer action.
    pub fn dispatch(&self, event: SurfaceEvent) -> ClickOutcome {
        match event {
            SurfaceEvent::SurfaceClicked(position) => {
                let handler = {
                    let state = self.inner.lock();
                    if state.destroyed {
                        return ClickOutcome::Ignored;
                    }
                    state.adapter.surface_click_handler()
                };
                match handler {
                    Some(handler) => {
                        handler(position);
                        ClickOutcome::EmptyArea(position)
                    }
                    None => ClickOutcome::Ignored,
                }
            }
            SurfaceEvent::MarkerClicked(marker) => {
                let mut guard = self.inner.lock();
                let state = &mut *guard;
                if state.destroyed {
                    return ClickOutcome::Ignored;
                }
                let Some(entity) = state.reconciler.entity_for_marker(marker).cloned() else {
                    debug!(%marker, "Click on non-entity marker ignored");
                    return ClickOutcome::Ignored;
                };
                let handler = match &state.entity_click {
                    EntityClick::Handler(handler) => Some(Arc::clone(handler)),
                    EntityClick::DetailPopup => None,
                };
                match handler {
                    Some(handler) => {
                        drop(guard);
                        handler(&entity);
                        ClickOutcome::Entity(entity.id)
                    }
                    None => {
                        let popup = DetailPopup::for_entity(&entity);
                        if let Some(handle) = state.reconciler.handle_for(entity.id) {
                            state.adapter.open_popup(handle, &popup);
                        }
                        ClickOutcome::Popup(entity.id)
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Release all markers, stop tracking and drop the surface.
    ///
    /// Safe to call more than once.
    pub fn destroy(&self) {
        let event = self.inner.lock().teardown();
        self.publish(event);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_destroyed(&self) -> bool {
        self.inner.lock().destroyed
    }

    pub fn marker_count(&self) -> usize {
        self.inner.lock().reconciler.len()
    }

    /// Native marker currently rendered for an entity.
    pub fn marker_for(&self, id: EntityId) -> Option<NativeMarkerId> {
        self.inner
            .lock()
            .reconciler
            .handle_for(id)
            .map(|handle| handle.native_id())
    }

    /// Ids with a rendered marker, ascending.
    pub fn rendered_ids(&self) -> Vec<EntityId> {
        self.inner.lock().reconciler.ids()
    }

    /// The current entity collection.
    pub fn entities(&self) -> Vec<PointEntity> {
        self.inner.lock().entities.clone()
    }

    pub fn one_shot_session(&self) -> LocationSession {
        self.inner.lock().location.one_shot_session()
    }

    pub fn tracking_session(&self) -> LocationSession {
        self.inner.lock().location.tracking_session()
    }

    pub fn one_shot_status(&self) -> SessionStatus {
        self.one_shot_session().status
    }

    pub fn tracking_status(&self) -> SessionStatus {
        self.tracking_session().status
    }

    /// Whether a continuous session is acquiring or active.
    pub fn is_tracking(&self) -> bool {
        self.tracking_status().is_live()
    }

    /// Token of the live watch subscription, if any.
    pub fn active_watch(&self) -> Option<WatchToken> {
        self.tracking_session().subscription
    }

    /// Position of the user marker, once a fix has been applied.
    pub fn user_position(&self) -> Option<LatLng> {
        self.inner
            .lock()
            .location
            .user_marker()
            .map(|handle| handle.position())
    }
}

fn publish(events: &broadcast::Sender<LocationEvent>, event: Option<LocationEvent>) {
    if let Some(event) = event {
        // No subscribers is fine.
        let _ = events.send(event);
    }
}

/// Build the provider callback for one watch generation.
fn watch_callback(
    inner: Weak<Mutex<EngineState>>,
    events: broadcast::Sender<LocationEvent>,
    generation: u64,
) -> WatchCallback {
    Arc::new(move |outcome: Result<Fix, PositionError>| {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let event = {
            let mut guard = inner.lock();
            let state = &mut *guard;
            if state.destroyed {
                return;
            }
            state
                .location
                .handle_watch_update(&mut state.adapter, generation, outcome)
        };
        publish(&events, event);
    })
}
