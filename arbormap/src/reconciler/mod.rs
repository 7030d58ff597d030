//! Marker reconciliation.
//!
//! Keeps exactly one native marker per supplied [`PointEntity`]. Each call to
//! [`MarkerReconciler::reconcile`] diffs the incoming collection against the
//! markers currently rendered and applies only the difference:
//!
//! ```text
//! rendered ids  {1, 2, 3}        incoming ids {2, 3, 4}
//!   remove  {1}        keep {2, 3}        create {4}
//! ```
//!
//! An id whose coordinates changed is removed and recreated. Entities with
//! out-of-range coordinates are skipped. After the diff the camera is fitted
//! around all rendered markers, unless none remain.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::display::{
    DisplayError, MapProvider, MarkerHandle, MarkerIcon, MarkerSpec, MarkerTag, NativeMarkerId,
    SurfaceAdapter,
};
use crate::entity::{EntityId, PointEntity};
use crate::geo::LatLng;

/// A live marker bound to the entity it was created from.
#[derive(Debug)]
struct RenderedMarker {
    entity: PointEntity,
    handle: MarkerHandle,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Ids whose markers were created this pass (including relocations).
    pub created: Vec<EntityId>,
    /// Ids whose markers were destroyed this pass (including relocations).
    pub removed: Vec<EntityId>,
    /// Ids removed and recreated because their coordinates changed.
    pub relocated: Vec<EntityId>,
    /// Ids left untouched.
    pub unchanged: usize,
    /// Ids skipped because their coordinates are invalid.
    pub rejected: Vec<EntityId>,
    /// Whether the camera was fitted to the resulting markers.
    pub fitted: bool,
}

impl ReconcileReport {
    /// Total native create and destroy calls made.
    pub fn churn(&self) -> usize {
        self.created.len() + self.removed.len()
    }
}

/// Owner of the entity id → marker mapping.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    rendered: BTreeMap<EntityId, RenderedMarker>,
    by_native: HashMap<NativeMarkerId, EntityId>,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the rendered markers in line with `entities`.
    ///
    /// Duplicate ids in `entities` are ignored after the first occurrence and
    /// entities with invalid coordinates are skipped. If the provider fails to
    /// construct a marker the rest of the collection is still rendered and the
    /// camera is fitted to what exists; the first such error is returned.
    pub fn reconcile<M: MapProvider>(
        &mut self,
        adapter: &mut SurfaceAdapter<M>,
        entities: &[PointEntity],
    ) -> Result<ReconcileReport, DisplayError> {
        let mut report = ReconcileReport::default();

        let mut incoming: Vec<&PointEntity> = Vec::with_capacity(entities.len());
        let mut seen = HashSet::with_capacity(entities.len());
        for entity in entities {
            if !seen.insert(entity.id) {
                warn!(id = %entity.id, "Duplicate entity id in collection, ignoring repeat");
                continue;
            }
            if let Err(e) = entity.position().validate() {
                warn!(id = %entity.id, error = %e, "Entity has invalid coordinates, skipping");
                report.rejected.push(entity.id);
                continue;
            }
            incoming.push(entity);
        }
        let incoming_by_id: HashMap<EntityId, &PointEntity> =
            incoming.iter().map(|e| (e.id, *e)).collect();

        let stale: Vec<EntityId> = self
            .rendered
            .iter()
            .filter_map(|(id, rendered)| match incoming_by_id.get(id) {
                None => Some(*id),
                Some(entity) if entity.position() != rendered.entity.position() => {
                    report.relocated.push(*id);
                    Some(*id)
                }
                Some(_) => None,
            })
            .collect();

        for id in stale {
            if let Some(rendered) = self.rendered.remove(&id) {
                self.by_native.remove(&rendered.handle.native_id());
                adapter.remove_marker(rendered.handle);
                report.removed.push(id);
            }
        }

        let mut failure = None;
        for entity in incoming {
            if self.rendered.contains_key(&entity.id) {
                report.unchanged += 1;
                continue;
            }
            let spec = MarkerSpec::new(entity.position(), entity.title(), MarkerIcon::Tree);
            let handle = match adapter.add_marker(&spec, MarkerTag::Entity(entity.id)) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(id = %entity.id, error = %e, "Marker construction failed");
                    failure.get_or_insert(e);
                    continue;
                }
            };
            self.by_native.insert(handle.native_id(), entity.id);
            self.rendered.insert(
                entity.id,
                RenderedMarker {
                    entity: entity.clone(),
                    handle,
                },
            );
            report.created.push(entity.id);
        }

        if !self.rendered.is_empty() {
            report.fitted = adapter.fit_to_bounds(self.positions());
        }

        debug!(
            created = report.created.len(),
            removed = report.removed.len(),
            relocated = report.relocated.len(),
            unchanged = report.unchanged,
            rejected = report.rejected.len(),
            total = self.rendered.len(),
            "Markers reconciled"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Destroy every entity marker. Used on teardown.
    pub fn clear<M: MapProvider>(&mut self, adapter: &mut SurfaceAdapter<M>) -> usize {
        let count = self.rendered.len();
        self.by_native.clear();
        for (_, rendered) in std::mem::take(&mut self.rendered) {
            adapter.remove_marker(rendered.handle);
        }
        count
    }

    /// The entity a native marker was created for.
    pub fn entity_for_marker(&self, marker: NativeMarkerId) -> Option<&PointEntity> {
        let id = self.by_native.get(&marker)?;
        self.rendered.get(id).map(|r| &r.entity)
    }

    /// The marker handle rendered for an entity id.
    pub fn handle_for(&self, id: EntityId) -> Option<&MarkerHandle> {
        self.rendered.get(&id).map(|r| &r.handle)
    }

    /// Entities currently rendered, ordered by id.
    pub fn entities(&self) -> Vec<PointEntity> {
        self.rendered.values().map(|r| r.entity.clone()).collect()
    }

    /// Rendered ids in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        self.rendered.keys().copied().collect()
    }

    pub fn positions(&self) -> Vec<LatLng> {
        self.rendered.values().map(|r| r.handle.position()).collect()
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}
