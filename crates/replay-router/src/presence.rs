use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use traceview_core_types::SessionId;

/// Answers whether a viewer session still exists.
#[async_trait]
pub trait SessionPresence: Send + Sync {
    async fn is_alive(&self, session: &SessionId) -> bool;
}

/// Sessions stay alive for `ttl` after their last request.
#[derive(Debug)]
pub struct SessionLeases {
    ttl: Duration,
    seen: DashMap<SessionId, Instant>,
}

impl SessionLeases {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: DashMap::new(),
        }
    }

    pub fn touch(&self, session: &SessionId) {
        self.seen.insert(session.clone(), Instant::now());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drops expired leases and returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.seen.len();
        self.seen
            .retain(|_, last| now.saturating_duration_since(*last) < self.ttl);
        before.saturating_sub(self.seen.len())
    }

    fn alive_at(&self, session: &SessionId, now: Instant) -> bool {
        self.seen
            .get(session)
            .map(|last| now.saturating_duration_since(*last) < self.ttl)
            .unwrap_or(false)
    }
}

#[async_trait]
impl SessionPresence for SessionLeases {
    async fn is_alive(&self, session: &SessionId) -> bool {
        self.alive_at(session, Instant::now())
    }
}
