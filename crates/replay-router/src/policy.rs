use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the router and its background maintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterPolicyView {
    pub gc_interval_secs: u64,
    pub session_ttl_secs: u64,
    /// Directory relative trace ids are resolved against.
    pub trace_root: Option<PathBuf>,
    pub snapshot_bus_capacity: usize,
}

impl Default for RouterPolicyView {
    fn default() -> Self {
        Self {
            gc_interval_secs: 30,
            session_ttl_secs: 300,
            trace_root: None,
            snapshot_bus_capacity: 256,
        }
    }
}

impl RouterPolicyView {
    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.max(1))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
