use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use traceview_replay_router::{SessionLeases, TraceRouter};

#[derive(Clone)]
pub struct ServeState {
    pub router: Arc<TraceRouter>,
    pub leases: Arc<SessionLeases>,
    pub health: Arc<ServeHealth>,
}

impl ServeState {
    pub fn new(router: Arc<TraceRouter>, leases: Arc<SessionLeases>) -> Self {
        Self {
            router,
            leases,
            health: Arc::new(ServeHealth::new()),
        }
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        let inner = self.health.snapshot();
        HealthSnapshot {
            loaded_traces: self.router.loaded_count(),
            active_sessions: self.router.active_session_count(),
            ..inner
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub live: bool,
    pub ready: bool,
    pub started_at: Option<i64>,
    pub loaded_traces: usize,
    pub active_sessions: usize,
}

#[derive(Default)]
pub struct ServeHealth {
    live: AtomicBool,
    ready: AtomicBool,
    started_at: AtomicU64,
}

impl ServeHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_live(&self) {
        self.live.store(true, Ordering::SeqCst);
    }

    pub fn mark_ready(&self) {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        self.started_at.store(now, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let started = self.started_at.load(Ordering::SeqCst);
        HealthSnapshot {
            live: self.live.load(Ordering::SeqCst),
            ready: self.ready.load(Ordering::SeqCst),
            started_at: (started > 0).then(|| i64::try_from(started).unwrap_or(i64::MAX)),
            ..HealthSnapshot::default()
        }
    }
}
