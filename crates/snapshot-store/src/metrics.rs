use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct SnapMetrics {
    frame_snapshots: AtomicU64,
    resources: AtomicU64,
    lookup_misses: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SnapMetricsSnapshot {
    pub frame_snapshots: u64,
    pub resources: u64,
    pub lookup_misses: u64,
}

impl SnapMetrics {
    pub fn record_frame_snapshot(&self) {
        self.frame_snapshots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resource(&self) {
        self.resources.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.lookup_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SnapMetricsSnapshot {
        SnapMetricsSnapshot {
            frame_snapshots: self.frame_snapshots.load(Ordering::Relaxed),
            resources: self.resources.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
        }
    }
}
