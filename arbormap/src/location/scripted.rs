//! Replayable positioning provider.
//!
//! `ScriptedPositioning` implements [`PositioningProvider`] from queued
//! outcomes and manual emissions instead of real hardware. It backs the CLI
//! scenario replay and the test-suite. Clones share state.
//!
//! - One-shot requests take the next queued outcome, or stay pending until
//!   [`ScriptedPositioning::complete_next`] resolves them in request order.
//! - Watch updates are pushed with [`ScriptedPositioning::emit`] and
//!   [`ScriptedPositioning::emit_error`] to every live watch.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use super::error::PositionError;
use super::provider::{Fix, PositionOptions, PositioningProvider, WatchCallback, WatchToken};

type Outcome = Result<Fix, PositionError>;

struct ScriptedState {
    supported: bool,
    queued: VecDeque<Outcome>,
    pending: VecDeque<oneshot::Sender<Outcome>>,
    requests: Vec<PositionOptions>,
    watches: BTreeMap<WatchToken, (PositionOptions, WatchCallback)>,
    next_token: u64,
    registrations: usize,
    cleared: Vec<WatchToken>,
    fail_next_watch: Option<PositionError>,
}

impl Default for ScriptedState {
    fn default() -> Self {
        Self {
            supported: true,
            queued: VecDeque::new(),
            pending: VecDeque::new(),
            requests: Vec::new(),
            watches: BTreeMap::new(),
            next_token: 0,
            registrations: 0,
            cleared: Vec::new(),
            fail_next_watch: None,
        }
    }
}

/// Positioning provider driven by a script.
#[derive(Clone, Default)]
pub struct ScriptedPositioning {
    state: Arc<Mutex<ScriptedState>>,
}

impl std::fmt::Debug for ScriptedPositioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScriptedPositioning")
            .field("supported", &state.supported)
            .field("queued", &state.queued.len())
            .field("pending", &state.pending.len())
            .field("watches", &state.watches.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptedPositioning {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider for a platform without positioning capability.
    pub fn unsupported() -> Self {
        let provider = Self::new();
        provider.set_supported(false);
        provider
    }

    pub fn set_supported(&self, supported: bool) {
        self.state.lock().supported = supported;
    }

    /// Queue the outcome for a future one-shot request.
    pub fn queue(&self, outcome: Outcome) {
        self.state.lock().queued.push_back(outcome);
    }

    pub fn queue_fix(&self, lat: f64, lng: f64) {
        self.queue(Ok(Fix::new(lat, lng)));
    }

    /// Resolve the oldest pending one-shot request.
    ///
    /// Returns `false` if nothing was pending (or the requester went away).
    pub fn complete_next(&self, outcome: Outcome) -> bool {
        let sender = self.state.lock().pending.pop_front();
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Options passed to every one-shot request, oldest first.
    pub fn requests(&self) -> Vec<PositionOptions> {
        self.state.lock().requests.clone()
    }

    /// Report the error synchronously from inside the next `watch_position`.
    pub fn fail_next_watch(&self, error: PositionError) {
        self.state.lock().fail_next_watch = Some(error);
    }

    /// Deliver a fix to every live watch.
    pub fn emit(&self, fix: Fix) -> usize {
        self.deliver(Ok(fix))
    }

    /// Deliver an error to every live watch.
    pub fn emit_error(&self, error: PositionError) -> usize {
        self.deliver(Err(error))
    }

    fn deliver(&self, outcome: Outcome) -> usize {
        let callbacks: Vec<WatchCallback> = self
            .state
            .lock()
            .watches
            .values()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        // Callbacks re-enter the provider (clear_watch), so the lock is released first.
        for cb in &callbacks {
            cb(outcome.clone());
        }
        callbacks.len()
    }

    pub fn active_watches(&self) -> Vec<WatchToken> {
        self.state.lock().watches.keys().copied().collect()
    }

    /// Options of the most recent watch registration.
    pub fn last_watch_options(&self) -> Option<PositionOptions> {
        self.state
            .lock()
            .watches
            .values()
            .last()
            .map(|(options, _)| *options)
    }

    /// Total `watch_position` calls.
    pub fn watch_registrations(&self) -> usize {
        self.state.lock().registrations
    }

    /// Tokens passed to `clear_watch`, in order.
    pub fn cleared(&self) -> Vec<WatchToken> {
        self.state.lock().cleared.clone()
    }
}

impl PositioningProvider for ScriptedPositioning {
    fn is_supported(&self) -> bool {
        self.state.lock().supported
    }

    fn current_position(&self, options: PositionOptions) -> BoxFuture<'static, Outcome> {
        let mut state = self.state.lock();
        state.requests.push(options);
        if let Some(outcome) = state.queued.pop_front() {
            return futures::future::ready(outcome).boxed();
        }
        let (tx, rx) = oneshot::channel();
        state.pending.push_back(tx);
        async move { rx.await.unwrap_or_else(|_| Err(PositionError::unavailable())) }.boxed()
    }

    fn watch_position(&self, options: PositionOptions, callback: WatchCallback) -> WatchToken {
        let (token, sync_error) = {
            let mut state = self.state.lock();
            state.next_token += 1;
            state.registrations += 1;
            let token = WatchToken(state.next_token);
            state.watches.insert(token, (options, Arc::clone(&callback)));
            (token, state.fail_next_watch.take())
        };
        debug!(%token, "Scripted watch registered");
        if let Some(error) = sync_error {
            callback(Err(error));
        }
        token
    }

    fn clear_watch(&self, token: WatchToken) {
        let mut state = self.state.lock();
        state.watches.remove(&token);
        state.cleared.push(token);
        debug!(%token, "Scripted watch cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_queued_outcome_resolves_immediately() {
        let provider = ScriptedPositioning::new();
        provider.queue_fix(35.0, 139.0);

        let fix = provider
            .current_position(PositionOptions::one_shot())
            .await
            .unwrap();
        assert_eq!(fix.position.lat, 35.0);
        assert_eq!(provider.requests(), vec![PositionOptions::one_shot()]);
    }

    #[tokio::test]
    async fn test_pending_requests_resolve_in_order() {
        let provider = ScriptedPositioning::new();
        let first = provider.current_position(PositionOptions::one_shot());
        let second = provider.current_position(PositionOptions::one_shot());
        assert_eq!(provider.pending_requests(), 2);

        assert!(provider.complete_next(Ok(Fix::new(1.0, 1.0))));
        assert!(provider.complete_next(Err(PositionError::timeout())));

        assert_eq!(first.await.unwrap().position.lat, 1.0);
        assert_eq!(second.await.unwrap_err(), PositionError::timeout());
    }

    #[test]
    fn test_emit_reaches_live_watches_only() {
        let provider = ScriptedPositioning::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let token = provider.watch_position(
            PositionOptions::continuous(),
            Arc::new(move |_: Outcome| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(provider.emit(Fix::new(0.0, 0.0)), 1);
        provider.clear_watch(token);
        assert_eq!(provider.emit(Fix::new(0.0, 0.0)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sync_watch_failure_invokes_callback() {
        let provider = ScriptedPositioning::new();
        provider.fail_next_watch(PositionError::permission_denied());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        provider.watch_position(
            PositionOptions::continuous(),
            Arc::new(move |outcome: Outcome| {
                assert!(outcome.is_err());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
