use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::OrchidError;

/// Request-scoped trace identity, passed explicitly through every node
/// call. Never looked up ambiently.
#[derive(Clone, Debug)]
pub struct TraceContext {
    pub trace_id: String,
    pub session_id: String,
    pub started: Instant,
}

impl TraceContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            session_id: session_id.into(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Node-level timing hooks. Purely additive: implementations must never
/// influence routing outcomes.
pub trait TurnObserver: Send + Sync {
    fn on_node_enter(&self, _node: &str, _trace: &TraceContext) {}
    fn on_node_exit(
        &self,
        _node: &str,
        _trace: &TraceContext,
        _elapsed: Duration,
        _changed: &[&'static str],
    ) {
    }
    fn on_decision(&self, _kind: &str, _cached: bool, _elapsed: Duration) {}
    fn on_error(&self, _node: &str, _error: &OrchidError) {}
    fn on_checkpoint_saved(&self, _session_id: &str) {}
}

/// Observer that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl TurnObserver for NullObserver {}
