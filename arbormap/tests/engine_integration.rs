//! Integration tests for the engine facade.
//!
//! These tests drive the public API end to end over a headless surface and a
//! scripted positioning provider:
//! - Marker sync across successive entity collections
//! - One-shot locate and continuous tracking lifecycles
//! - Click routing and teardown
//!
//! Run with: `cargo test --test engine_integration`

use std::sync::Arc;

use parking_lot::Mutex;

use arbormap::display::{HeadlessSurface, MarkerIcon, SurfaceEvent, SurfaceOp};
use arbormap::engine::{ClickOutcome, Engine, EngineConfig};
use arbormap::entity::{EntityId, PointEntity};
use arbormap::error::EngineError;
use arbormap::geo::{GeoBounds, LatLng, DEFAULT_CENTER, DEFAULT_ZOOM};
use arbormap::location::{
    Fix, LocationError, LocationEvent, PositionError, ScriptedPositioning, SessionMode,
    SessionStatus,
};

// ============================================================================
// Helper Functions
// ============================================================================

struct Harness {
    engine: Engine,
    surface: HeadlessSurface,
    positioning: ScriptedPositioning,
}

fn harness(config: EngineConfig) -> Harness {
    let surface = HeadlessSurface::new();
    let positioning = ScriptedPositioning::new();
    let engine = Engine::create(surface.clone(), Arc::new(positioning.clone()), config)
        .expect("engine creation");
    Harness {
        engine,
        surface,
        positioning,
    }
}

fn tree(id: i64, lat: f64, lng: f64) -> PointEntity {
    PointEntity::new(id, lat, lng, "Oak")
}

fn bounds_of(points: &[(f64, f64)]) -> GeoBounds {
    GeoBounds::from_positions(points.iter().map(|(lat, lng)| LatLng::new(*lat, *lng)))
        .expect("non-empty")
}

/// Entity markers currently live on the surface.
fn tree_markers(surface: &HeadlessSurface) -> usize {
    surface
        .live_markers()
        .iter()
        .filter(|(_, spec)| spec.icon == MarkerIcon::Tree)
        .count()
}

// ============================================================================
// Marker Sync
// ============================================================================

#[test]
fn test_first_collection_renders_and_fits() {
    let h = harness(EngineConfig::new("map"));

    let report = h.engine.update_entities(vec![tree(1, 35.0, 139.0)]).unwrap();

    assert_eq!(report.created, vec![EntityId(1)]);
    assert_eq!(h.surface.markers_created(), 1);
    assert_eq!(h.surface.fit_calls(), vec![bounds_of(&[(35.0, 139.0)])]);
}

#[test]
fn test_second_collection_adds_only_new_marker() {
    let h = harness(EngineConfig::new("map"));
    h.engine.update_entities(vec![tree(1, 35.0, 139.0)]).unwrap();

    let report = h
        .engine
        .update_entities(vec![tree(1, 35.0, 139.0), tree(2, 36.0, 140.0)])
        .unwrap();

    assert_eq!(report.created, vec![EntityId(2)]);
    assert!(report.removed.is_empty());
    assert_eq!(h.surface.markers_created(), 2);
    assert_eq!(h.surface.markers_destroyed(), 0);
    assert_eq!(
        h.surface.fit_calls().last(),
        Some(&bounds_of(&[(35.0, 139.0), (36.0, 140.0)]))
    );
}

#[test]
fn test_churn_equals_symmetric_difference() {
    let h = harness(EngineConfig::new("map"));
    h.engine
        .update_entities(vec![tree(1, 1.0, 1.0), tree(2, 2.0, 2.0), tree(3, 3.0, 3.0)])
        .unwrap();
    let created_before = h.surface.markers_created();

    let report = h
        .engine
        .update_entities(vec![tree(2, 2.0, 2.0), tree(3, 3.0, 3.0), tree(4, 4.0, 4.0)])
        .unwrap();

    assert_eq!(report.churn(), 2);
    assert_eq!(h.surface.markers_created() - created_before, 1);
    assert_eq!(h.surface.markers_destroyed(), 1);
    assert_eq!(
        h.engine.rendered_ids(),
        vec![EntityId(2), EntityId(3), EntityId(4)]
    );
    assert_eq!(h.surface.invalid_destroys(), 0);
}

#[test]
fn test_empty_collection_clears_without_fit() {
    let h = harness(EngineConfig::new("map"));
    h.engine.update_entities(vec![tree(1, 35.0, 139.0)]).unwrap();
    let fits_before = h.surface.fit_calls().len();

    let report = h.engine.update_entities(Vec::new()).unwrap();

    assert!(!report.fitted);
    assert_eq!(h.engine.marker_count(), 0);
    assert_eq!(h.surface.fit_calls().len(), fits_before);
}

#[test]
fn test_one_fit_per_update() {
    let h = harness(EngineConfig::new("map"));
    for n in 1..=4 {
        let entities = (1..=n).map(|id| tree(id, id as f64, id as f64)).collect();
        h.engine.update_entities(entities).unwrap();
    }
    assert_eq!(h.surface.fit_calls().len(), 4);
}

#[test]
fn test_relocated_entity_is_recreated() {
    let h = harness(EngineConfig::new("map"));
    h.engine.update_entities(vec![tree(1, 35.0, 139.0)]).unwrap();

    let report = h.engine.update_entities(vec![tree(1, 35.5, 139.5)]).unwrap();

    assert_eq!(report.relocated, vec![EntityId(1)]);
    let markers = h.surface.live_markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].1.position, LatLng::new(35.5, 139.5));
}

#[test]
fn test_failed_marker_keeps_mapping_consistent() {
    let h = harness(EngineConfig::new("map"));
    h.surface.fail_next_markers(1);

    let err = h
        .engine
        .update_entities(vec![tree(1, 35.0, 139.0), tree(2, 36.0, 140.0)])
        .unwrap_err();

    assert!(matches!(err, EngineError::Display(_)));
    assert_eq!(h.engine.marker_count(), tree_markers(&h.surface));

    // The next update retries what is missing.
    h.engine
        .update_entities(vec![tree(1, 35.0, 139.0), tree(2, 36.0, 140.0)])
        .unwrap();
    assert_eq!(h.engine.marker_count(), 2);
    assert_eq!(tree_markers(&h.surface), 2);
}

#[test]
fn test_entity_payload_from_rest_shape() {
    let h = harness(EngineConfig::new("map"));
    let payload = r#"[
        {"id": 7, "lat": 35.1, "lng": 139.1, "type": "Cedar", "lidar_url": "s3://scans/7.las"},
        {"id": 8, "lat": 35.2, "lng": 139.2, "type": "Pine", "lidar_url": null}
    ]"#;
    let entities: Vec<PointEntity> = serde_json::from_str(payload).unwrap();

    h.engine.update_entities(entities).unwrap();

    let titles: Vec<String> = h
        .surface
        .live_markers()
        .into_iter()
        .map(|(_, spec)| spec.title)
        .collect();
    assert!(titles.contains(&"Cedar (ID: 7)".to_string()));
    assert!(titles.contains(&"Pine (ID: 8)".to_string()));
}

// ============================================================================
// One-Shot Locate
// ============================================================================

#[tokio::test]
async fn test_locate_once_centers_and_places_marker() {
    let h = harness(EngineConfig::new("map"));
    h.positioning.queue_fix(35.68, 139.76);

    let fix = h.engine.locate_once().await.unwrap();

    assert_eq!(fix.position, LatLng::new(35.68, 139.76));
    assert_eq!(h.surface.center(), Some(LatLng::new(35.68, 139.76)));
    assert_eq!(h.surface.zoom(), Some(15));
    assert_eq!(h.engine.user_position(), Some(LatLng::new(35.68, 139.76)));
    assert_eq!(h.surface.live_marker_count(), 1);
}

#[tokio::test]
async fn test_second_fix_moves_same_user_marker() {
    let h = harness(EngineConfig::new("map"));
    h.positioning.queue_fix(35.68, 139.76);
    h.positioning.queue_fix(35.69, 139.77);

    h.engine.locate_once().await.unwrap();
    h.engine.locate_once().await.unwrap();

    assert_eq!(h.surface.markers_created(), 1);
    assert_eq!(h.surface.live_marker_count(), 1);
    assert_eq!(h.engine.user_position(), Some(LatLng::new(35.69, 139.77)));
}

#[tokio::test]
async fn test_locate_failure_leaves_camera_alone() {
    let h = harness(EngineConfig::new("map"));
    h.positioning.queue(Err(PositionError::timeout()));

    let err = h.engine.locate_once().await.unwrap_err();

    assert_eq!(err.location_kind(), Some(LocationError::Timeout));
    assert_eq!(h.surface.center(), Some(DEFAULT_CENTER));
    assert_eq!(h.surface.zoom(), Some(DEFAULT_ZOOM));
    assert_eq!(h.surface.live_marker_count(), 0);
    assert_eq!(
        h.engine.one_shot_status(),
        SessionStatus::Failed(LocationError::Timeout)
    );
}

#[tokio::test]
async fn test_user_marker_failure_keeps_camera_still() {
    let h = harness(EngineConfig::new("map"));
    h.positioning.queue_fix(35.68, 139.76);
    h.surface.fail_next_markers(1);
    let mut events = h.engine.subscribe();

    let err = h.engine.locate_once().await.unwrap_err();

    assert!(matches!(err, EngineError::Display(_)));
    assert_eq!(h.surface.center(), Some(DEFAULT_CENTER));
    assert_eq!(h.surface.zoom(), Some(DEFAULT_ZOOM));
    assert_eq!(h.engine.user_position(), None);
    assert!(events.try_recv().is_err());

    // A later fix succeeds normally.
    h.positioning.queue_fix(35.68, 139.76);
    h.engine.locate_once().await.unwrap();
    assert_eq!(h.surface.center(), Some(LatLng::new(35.68, 139.76)));
}

#[tokio::test]
async fn test_concurrent_locates_are_independent() {
    let h = harness(EngineConfig::new("map"));
    let first = tokio::spawn({
        let engine = h.engine.clone();
        async move { engine.locate_once().await }
    });
    let second = tokio::spawn({
        let engine = h.engine.clone();
        async move { engine.locate_once().await }
    });
    while h.positioning.pending_requests() < 2 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.engine.one_shot_status(), SessionStatus::Acquiring);

    h.positioning.complete_next(Ok(Fix::new(1.0, 1.0)));
    h.positioning.complete_next(Ok(Fix::new(2.0, 2.0)));

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(h.positioning.requests().len(), 2);
    assert_eq!(h.surface.live_marker_count(), 1);
}

// ============================================================================
// Continuous Tracking
// ============================================================================

#[test]
fn test_start_twice_registers_once() {
    let h = harness(EngineConfig::new("map"));

    h.engine.start_tracking().unwrap();
    h.engine.start_tracking().unwrap();

    assert_eq!(h.positioning.watch_registrations(), 1);
    assert_eq!(h.positioning.active_watches().len(), 1);
    assert!(h.engine.is_tracking());
    assert_eq!(h.engine.tracking_status(), SessionStatus::Acquiring);
}

#[test]
fn test_ticks_move_marker_and_pan() {
    let h = harness(EngineConfig::new("map"));
    h.engine.start_tracking().unwrap();

    h.positioning.emit(Fix::new(35.0, 139.0));
    h.positioning.emit(Fix::new(35.001, 139.001));

    assert_eq!(h.engine.tracking_status(), SessionStatus::Active);
    assert_eq!(h.surface.markers_created(), 1);
    assert_eq!(h.surface.center(), Some(LatLng::new(35.001, 139.001)));
    assert_eq!(h.engine.user_position(), Some(LatLng::new(35.001, 139.001)));
}

#[test]
fn test_stop_then_start_creates_new_token() {
    let h = harness(EngineConfig::new("map"));
    h.engine.start_tracking().unwrap();
    let first = h.engine.active_watch().unwrap();

    h.engine.stop_tracking();
    assert!(h.positioning.active_watches().is_empty());
    assert_eq!(h.engine.tracking_status(), SessionStatus::Idle);

    h.engine.start_tracking().unwrap();
    let second = h.engine.active_watch().unwrap();
    assert_ne!(first, second);
    assert_eq!(h.positioning.active_watches(), vec![second]);
}

#[tokio::test]
async fn test_error_while_active_releases_watch() {
    let h = harness(EngineConfig::new("map"));
    let mut events = h.engine.subscribe();
    h.engine.start_tracking().unwrap();
    h.positioning.emit(Fix::new(35.0, 139.0));
    let first = h.engine.active_watch().unwrap();

    h.positioning
        .emit_error(PositionError::unavailable());

    assert!(h.positioning.active_watches().is_empty());
    assert_eq!(h.positioning.cleared(), vec![first]);
    assert_eq!(
        h.engine.tracking_status(),
        SessionStatus::Failed(LocationError::PositionUnavailable)
    );

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        if event
            == (LocationEvent::Error {
                mode: SessionMode::Continuous,
                error: LocationError::PositionUnavailable,
            })
        {
            saw_error = true;
        }
    }
    assert!(saw_error);

    // A later start registers a fresh subscription.
    h.engine.start_tracking().unwrap();
    assert_eq!(h.positioning.watch_registrations(), 2);
    assert_ne!(h.engine.active_watch(), Some(first));
}

#[test]
fn test_permission_denied_on_start() {
    let h = harness(EngineConfig::new("map"));
    h.positioning
        .fail_next_watch(PositionError::permission_denied());

    let err = h.engine.start_tracking().unwrap_err();

    assert_eq!(err, EngineError::Location(LocationError::PermissionDenied));
    assert_eq!(
        h.engine.tracking_status(),
        SessionStatus::Failed(LocationError::PermissionDenied)
    );
    assert!(h.engine.active_watch().is_none());
    assert!(h.positioning.active_watches().is_empty());
}

#[test]
fn test_stop_without_session_is_noop() {
    let h = harness(EngineConfig::new("map"));
    h.engine.stop_tracking();
    h.engine.stop_tracking();
    assert!(h.positioning.cleared().is_empty());
}

#[test]
fn test_unsupported_platform() {
    let surface = HeadlessSurface::new();
    let engine = Engine::create(
        surface,
        Arc::new(ScriptedPositioning::unsupported()),
        EngineConfig::new("map"),
    )
    .unwrap();
    let mut events = engine.subscribe();

    assert_eq!(
        engine.start_tracking(),
        Err(EngineError::Location(LocationError::Unsupported))
    );
    assert_eq!(engine.tracking_status(), SessionStatus::Idle);
    assert_eq!(
        events.try_recv().unwrap(),
        LocationEvent::Error {
            mode: SessionMode::Continuous,
            error: LocationError::Unsupported,
        }
    );
}

// ============================================================================
// Clicks
// ============================================================================

#[test]
fn test_empty_area_click_reaches_handler_only() {
    let empty_clicks: Arc<Mutex<Vec<(f64, f64)>>> = Arc::new(Mutex::new(Vec::new()));
    let entity_clicks = Arc::new(Mutex::new(0usize));
    let config = EngineConfig::new("map")
        .on_empty_area_click({
            let empty_clicks = Arc::clone(&empty_clicks);
            move |lat, lng| empty_clicks.lock().push((lat, lng))
        })
        .on_entity_click({
            let entity_clicks = Arc::clone(&entity_clicks);
            move |_| *entity_clicks.lock() += 1
        });
    let h = harness(config);

    let outcome = h
        .engine
        .dispatch(SurfaceEvent::SurfaceClicked(LatLng::new(35.0, 139.0)));

    assert_eq!(outcome, ClickOutcome::EmptyArea(LatLng::new(35.0, 139.0)));
    assert_eq!(*empty_clicks.lock(), vec![(35.0, 139.0)]);
    assert_eq!(*entity_clicks.lock(), 0);
}

#[test]
fn test_entity_click_reaches_handler_only() {
    let clicked: Arc<Mutex<Vec<EntityId>>> = Arc::new(Mutex::new(Vec::new()));
    let empty_clicks = Arc::new(Mutex::new(0usize));
    let config = EngineConfig::new("map")
        .on_entity_click({
            let clicked = Arc::clone(&clicked);
            move |entity| clicked.lock().push(entity.id)
        })
        .on_empty_area_click({
            let empty_clicks = Arc::clone(&empty_clicks);
            move |_, _| *empty_clicks.lock() += 1
        });
    let h = harness(config);
    h.engine
        .update_entities(vec![tree(1, 35.0, 139.0), tree(2, 36.0, 140.0)])
        .unwrap();
    let (native, _) = h
        .surface
        .live_markers()
        .into_iter()
        .find(|(_, spec)| spec.title == "Oak (ID: 2)")
        .unwrap();

    h.engine.dispatch(SurfaceEvent::MarkerClicked(native));

    assert_eq!(*clicked.lock(), vec![EntityId(2)]);
    assert_eq!(*empty_clicks.lock(), 0);
}

#[test]
fn test_inserted_entity_is_clickable() {
    let h = harness(EngineConfig::new("map"));
    h.engine.update_entities(vec![tree(1, 35.0, 139.0)]).unwrap();

    h.engine
        .insert_entity(tree(2, 35.2, 139.2).with_auxiliary("https://scans/2.las"))
        .unwrap();
    let (native, _) = h
        .surface
        .live_markers()
        .into_iter()
        .find(|(_, spec)| spec.title == "Oak (ID: 2)")
        .unwrap();

    assert_eq!(
        h.engine.dispatch(SurfaceEvent::MarkerClicked(native)),
        ClickOutcome::Popup(EntityId(2))
    );
    let html = h
        .surface
        .ops()
        .into_iter()
        .find_map(|op| match op {
            SurfaceOp::OpenPopup { html, .. } => Some(html),
            _ => None,
        })
        .unwrap();
    assert!(html.contains("LiDAR: available"));
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_destroy_releases_everything() {
    let h = harness(EngineConfig::new("map"));
    h.engine
        .update_entities(vec![tree(1, 35.0, 139.0), tree(2, 36.0, 140.0)])
        .unwrap();
    h.engine.start_tracking().unwrap();
    h.positioning.emit(Fix::new(35.0, 139.0));

    h.engine.destroy();
    h.engine.destroy();

    assert!(h.engine.is_destroyed());
    assert_eq!(h.surface.live_marker_count(), 0);
    assert!(h.positioning.active_watches().is_empty());
    assert_eq!(h.surface.invalid_destroys(), 0);
    let releases = h
        .surface
        .ops()
        .iter()
        .filter(|op| matches!(op, SurfaceOp::ReleaseSurface(_)))
        .count();
    assert_eq!(releases, 1);
}

#[tokio::test]
async fn test_calls_after_destroy_fail() {
    let h = harness(EngineConfig::new("map"));
    h.engine.destroy();

    assert_eq!(h.engine.locate_once().await, Err(EngineError::Destroyed));
    assert_eq!(h.engine.insert_entity(tree(1, 0.0, 0.0)), Err(EngineError::Destroyed));
    assert_eq!(
        h.engine
            .dispatch(SurfaceEvent::SurfaceClicked(LatLng::new(0.0, 0.0))),
        ClickOutcome::Ignored
    );
    assert!(h.positioning.requests().is_empty());
}

#[test]
fn test_late_tick_after_destroy_is_dropped() {
    let h = harness(EngineConfig::new("map"));
    h.engine.start_tracking().unwrap();
    let ops_before = {
        h.engine.destroy();
        h.surface.ops().len()
    };

    assert_eq!(h.positioning.emit(Fix::new(35.0, 139.0)), 0);
    assert_eq!(h.surface.ops().len(), ops_before);
}
