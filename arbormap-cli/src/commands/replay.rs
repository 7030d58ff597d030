//! Replay command - run a scripted session against a headless surface.
//!
//! A scenario is a JSON file with a list of steps:
//!
//! ```json
//! {
//!   "name": "morning survey",
//!   "steps": [
//!     { "step": "entities", "entities": [{ "id": 1, "lat": 35.0, "lng": 139.0, "type": "Oak" }] },
//!     { "step": "locate", "lat": 35.68, "lng": 139.76 },
//!     { "step": "track_start" },
//!     { "step": "tick", "lat": 35.681, "lng": 139.761 },
//!     { "step": "tick_error", "code": "POSITION_UNAVAILABLE" },
//!     { "step": "click_entity", "id": 1 },
//!     { "step": "destroy" }
//!   ]
//! }
//! ```
//!
//! Each step prints the surface calls it caused and the location events it
//! produced. Engine errors are part of the output, not a command failure.

use std::path::Path;
use std::sync::Arc;

use arbormap::display::{HeadlessSurface, SurfaceEvent, SurfaceOp};
use arbormap::engine::{Engine, EngineConfig};
use arbormap::entity::{EntityId, PointEntity};
use arbormap::geo::LatLng;
use arbormap::location::{
    Fix, LocationEvent, PositionError, PositionErrorCode, ScriptedPositioning,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info};

use crate::error::CliError;

/// A scripted session.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the simulated platform offers positioning at all.
    #[serde(default = "default_supported")]
    pub positioning_supported: bool,
    pub steps: Vec<Step>,
}

fn default_supported() -> bool {
    true
}

/// One scenario step.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Replace the entity collection.
    Entities { entities: Vec<PointEntity> },
    /// A newly registered entity.
    Create { entity: PointEntity },
    /// One-shot locate that resolves to this position.
    Locate { lat: f64, lng: f64 },
    /// One-shot locate that fails.
    LocateError { code: PositionErrorCode },
    /// Start tracking, optionally with the provider refusing at registration.
    TrackStart {
        #[serde(default)]
        fail: Option<PositionErrorCode>,
    },
    /// Watch update.
    Tick { lat: f64, lng: f64 },
    /// Watch error.
    TickError { code: PositionErrorCode },
    TrackStop,
    /// Click on empty map area.
    ClickMap { lat: f64, lng: f64 },
    /// Click on an entity's marker.
    ClickEntity { id: EntityId },
    Destroy,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Entities { .. } => "entities",
            Step::Create { .. } => "create",
            Step::Locate { .. } => "locate",
            Step::LocateError { .. } => "locate_error",
            Step::TrackStart { .. } => "track_start",
            Step::Tick { .. } => "tick",
            Step::TickError { .. } => "tick_error",
            Step::TrackStop => "track_stop",
            Step::ClickMap { .. } => "click_map",
            Step::ClickEntity { .. } => "click_entity",
            Step::Destroy => "destroy",
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, Default)]
pub struct StepRecord {
    pub name: &'static str,
    pub ops: Vec<SurfaceOp>,
    pub events: Vec<LocationEvent>,
    pub notes: Vec<String>,
    pub error: Option<String>,
}

/// Outcome of a whole replay.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// Surface calls made while the engine was created.
    pub setup: Vec<SurfaceOp>,
    pub steps: Vec<StepRecord>,
    pub markers: usize,
    pub tracking: String,
    pub destroyed: bool,
}

/// Run the replay command.
pub async fn run(path: &Path, config: EngineConfig) -> Result<(), CliError> {
    let scenario = load_scenario(path)?;
    info!(
        path = %path.display(),
        steps = scenario.steps.len(),
        "Replaying scenario"
    );
    let report = replay(&scenario, config)?.await;
    print_report(scenario.name.as_deref(), &report);
    Ok(())
}

pub fn load_scenario(path: &Path) -> Result<Scenario, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError::Scenario {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| CliError::Scenario {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Build the engine for `scenario` and return the future that plays it.
///
/// Engine construction errors are returned immediately.
pub fn replay(
    scenario: &Scenario,
    config: EngineConfig,
) -> Result<impl std::future::Future<Output = ReplayReport>, CliError> {
    let surface = HeadlessSurface::new();
    let positioning = ScriptedPositioning::new();
    positioning.set_supported(scenario.positioning_supported);

    let notes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let config = config.on_empty_area_click({
        let notes = Arc::clone(&notes);
        move |lat, lng| {
            notes
                .lock()
                .push(format!("register new entity at ({:.6}, {:.6})", lat, lng));
        }
    });

    let engine = Engine::create(surface.clone(), Arc::new(positioning.clone()), config)?;
    let steps = scenario.steps.clone();

    Ok(async move {
        let mut events = engine.subscribe();
        let setup = surface.take_ops();
        let mut records = Vec::with_capacity(steps.len());

        for step in steps {
            debug!(step = step.name(), "Replay step");
            let mut record = StepRecord {
                name: step.name(),
                ..StepRecord::default()
            };
            if let Err(message) = apply(&engine, &positioning, step, &mut record).await {
                record.error = Some(message);
            }
            record.ops = surface.take_ops();
            record.events = drain(&mut events);
            record.notes.append(&mut notes.lock());
            records.push(record);
        }

        ReplayReport {
            setup,
            steps: records,
            markers: engine.marker_count(),
            tracking: engine.tracking_status().to_string(),
            destroyed: engine.is_destroyed(),
        }
    })
}

async fn apply(
    engine: &Engine,
    positioning: &ScriptedPositioning,
    step: Step,
    record: &mut StepRecord,
) -> Result<(), String> {
    match step {
        Step::Entities { entities } => {
            let report = engine.update_entities(entities).map_err(|e| e.to_string())?;
            record.notes.push(format!(
                "created {} removed {} unchanged {} rejected {}",
                report.created.len(),
                report.removed.len(),
                report.unchanged,
                report.rejected.len()
            ));
        }
        Step::Create { entity } => {
            engine.insert_entity(entity).map_err(|e| e.to_string())?;
        }
        Step::Locate { lat, lng } => {
            positioning.queue_fix(lat, lng);
            engine.locate_once().await.map_err(|e| e.to_string())?;
        }
        Step::LocateError { code } => {
            positioning.queue(Err(position_error(code)));
            engine.locate_once().await.map_err(|e| e.to_string())?;
        }
        Step::TrackStart { fail } => {
            if let Some(code) = fail {
                positioning.fail_next_watch(position_error(code));
            }
            engine.start_tracking().map_err(|e| e.to_string())?;
        }
        Step::Tick { lat, lng } => {
            let delivered = positioning.emit(Fix::new(lat, lng));
            record.notes.push(format!("delivered to {} watch(es)", delivered));
        }
        Step::TickError { code } => {
            let delivered = positioning.emit_error(position_error(code));
            record.notes.push(format!("delivered to {} watch(es)", delivered));
        }
        Step::TrackStop => engine.stop_tracking(),
        Step::ClickMap { lat, lng } => {
            let outcome = engine.dispatch(SurfaceEvent::SurfaceClicked(LatLng::new(lat, lng)));
            record.notes.push(format!("click -> {:?}", outcome));
        }
        Step::ClickEntity { id } => {
            let marker = engine
                .marker_for(id)
                .ok_or_else(|| format!("no marker rendered for entity {}", id))?;
            let outcome = engine.dispatch(SurfaceEvent::MarkerClicked(marker));
            record.notes.push(format!("click -> {:?}", outcome));
        }
        Step::Destroy => engine.destroy(),
    }
    Ok(())
}

fn position_error(code: PositionErrorCode) -> PositionError {
    match code {
        PositionErrorCode::PermissionDenied => PositionError::permission_denied(),
        PositionErrorCode::PositionUnavailable => PositionError::unavailable(),
        PositionErrorCode::Timeout => PositionError::timeout(),
    }
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<LocationEvent>) -> Vec<LocationEvent> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => drained.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "Replay event receiver lagged");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    drained
}

pub fn describe_event(event: &LocationEvent) -> String {
    match event {
        LocationEvent::Fix { mode, fix } => match fix.accuracy_m {
            Some(accuracy) => format!("{:?} fix at {} (±{:.0} m)", mode, fix.position, accuracy),
            None => format!("{:?} fix at {}", mode, fix.position),
        },
        LocationEvent::Error { mode, error } => format!("{:?} error: {}", mode, error),
        LocationEvent::DisplayFailed(e) => format!("display failed: {}", e),
        LocationEvent::TrackingStarted(token) => format!("tracking started ({})", token),
        LocationEvent::TrackingStopped { token: Some(token) } => {
            format!("tracking stopped ({})", token)
        }
        LocationEvent::TrackingStopped { token: None } => "tracking stopped".to_string(),
    }
}

fn print_report(name: Option<&str>, report: &ReplayReport) {
    println!("Scenario: {}", name.unwrap_or("(unnamed)"));
    println!();
    for op in &report.setup {
        println!("    op     {}", op);
    }
    for (index, step) in report.steps.iter().enumerate() {
        println!("[{}] {}", index + 1, step.name);
        for op in &step.ops {
            println!("    op     {}", op);
        }
        for event in &step.events {
            println!("    event  {}", describe_event(event));
        }
        for note in &step.notes {
            println!("    note   {}", note);
        }
        if let Some(error) = &step.error {
            println!("    error  {}", error);
        }
    }
    println!();
    println!(
        "Summary: {} marker(s), tracking {}, {}",
        report.markers,
        report.tracking,
        if report.destroyed { "destroyed" } else { "live" }
    );
}
