use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use traceview_core_types::{SessionId, TraceId};
use traceview_event_bus::InMemoryBus;
use traceview_snapshot_store::{
    RenderedFrameSnapshot, ResourceSnapshot, SnapshotAdded, SnapshotRenderer, SnapshotStore,
    Viewport,
};
use traceview_trace_log::{IngestStats, TraceContext};

use crate::archive::{ArchiveOpener, TraceArchive};
use crate::errors::RouteResult;
use crate::loader::{load_trace, resource_for_sha1};
use crate::policy::RouterPolicyView;
use crate::presence::SessionPresence;

/// One trace held by the router cache.
pub struct LoadedTrace {
    pub trace: TraceId,
    pub context: Arc<TraceContext>,
    pub store: Arc<SnapshotStore>,
    pub archive: Arc<dyn TraceArchive>,
    pub owner: SessionId,
    pub loaded_at: DateTime<Utc>,
    pub stats: IngestStats,
}

/// Snapshot a session most recently displayed; its resource requests are
/// answered from this snapshot's point of view.
#[derive(Clone)]
struct ActiveSnapshot {
    trace: TraceId,
    renderer: Arc<SnapshotRenderer>,
    archive: Arc<dyn TraceArchive>,
}

/// A recorded resource together with its content.
#[derive(Clone, Debug)]
pub struct ResolvedResource {
    pub record: Arc<ResourceSnapshot>,
    pub body: Vec<u8>,
}

pub struct TraceRouter {
    opener: Arc<dyn ArchiveOpener>,
    presence: Option<Arc<dyn SessionPresence>>,
    traces: DashMap<TraceId, Arc<LoadedTrace>>,
    active: DashMap<SessionId, ActiveSnapshot>,
    snapshots: Arc<InMemoryBus<SnapshotAdded>>,
}

impl TraceRouter {
    pub fn new(opener: Arc<dyn ArchiveOpener>, policy: &RouterPolicyView) -> Self {
        Self {
            opener,
            presence: None,
            traces: DashMap::new(),
            active: DashMap::new(),
            snapshots: InMemoryBus::new(policy.snapshot_bus_capacity),
        }
    }

    pub fn with_presence(mut self, presence: Arc<dyn SessionPresence>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Frame snapshots as they are ingested by any trace load.
    pub fn snapshot_events(&self) -> broadcast::Receiver<SnapshotAdded> {
        self.snapshots.subscribe()
    }

    pub fn loaded(&self, trace: &TraceId) -> Option<Arc<LoadedTrace>> {
        self.traces.get(trace).map(|entry| Arc::clone(entry.value()))
    }

    pub fn loaded_count(&self) -> usize {
        self.traces.len()
    }

    pub fn active_session_count(&self) -> usize {
        self.active.len()
    }

    async fn load(&self, session: &SessionId, trace: &TraceId) -> RouteResult<Arc<LoadedTrace>> {
        if let Some(hit) = self.loaded(trace) {
            return Ok(hit);
        }
        // Concurrent first requests may both get here; the last insert wins.
        let archive = self.opener.open(trace).await?;
        let store = Arc::new(SnapshotStore::new());
        store.subscribe(self.snapshots.clone());
        let model = match load_trace(archive.as_ref(), store).await {
            Ok(model) => model,
            Err(err) => {
                warn!(trace = %trace, error = %err, "trace load failed");
                return Err(err);
            }
        };
        let loaded = Arc::new(LoadedTrace {
            trace: trace.clone(),
            context: Arc::new(model.context),
            store: model.store,
            archive,
            owner: session.clone(),
            loaded_at: Utc::now(),
            stats: model.stats,
        });
        self.traces.insert(trace.clone(), Arc::clone(&loaded));
        Ok(loaded)
    }

    pub async fn context(
        &self,
        session: &SessionId,
        trace: &TraceId,
    ) -> RouteResult<Arc<TraceContext>> {
        let loaded = self.load(session, trace).await?;
        Ok(Arc::clone(&loaded.context))
    }

    /// `Ok(None)` when the snapshot is unknown or carries no viewport.
    pub async fn snapshot_size(
        &self,
        session: &SessionId,
        trace: &TraceId,
        frame: &str,
        name: &str,
    ) -> RouteResult<Option<Viewport>> {
        let loaded = self.load(session, trace).await?;
        match loaded.store.by_name(frame, name) {
            Ok(renderer) => Ok(renderer.viewport()),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Renders the named snapshot and makes it the session's active snapshot.
    pub async fn snapshot(
        &self,
        session: &SessionId,
        trace: &TraceId,
        frame: &str,
        name: &str,
    ) -> RouteResult<RenderedFrameSnapshot> {
        let loaded = self.load(session, trace).await?;
        let renderer = loaded.store.by_name(frame, name)?;
        let rendered = renderer.render();
        self.active.insert(
            session.clone(),
            ActiveSnapshot {
                trace: trace.clone(),
                renderer,
                archive: Arc::clone(&loaded.archive),
            },
        );
        Ok(rendered)
    }

    /// Content blob by hash, searched across every loaded trace.
    pub async fn resource_by_sha1(&self, sha1: &str) -> RouteResult<Option<Vec<u8>>> {
        let archives: Vec<Arc<dyn TraceArchive>> = self
            .traces
            .iter()
            .map(|entry| Arc::clone(&entry.value().archive))
            .collect();
        for archive in archives {
            if let Some(bytes) = resource_for_sha1(archive.as_ref(), sha1).await? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    /// Resource as seen by the session's active snapshot.
    pub async fn resource_by_url(
        &self,
        session: &SessionId,
        url: &str,
    ) -> RouteResult<Option<ResolvedResource>> {
        let Some(active) = self.active.get(session).map(|entry| entry.value().clone()) else {
            debug!(session = %session, "no active snapshot for resource request");
            return Ok(None);
        };
        let url = strip_fragment(url);
        let Some(record) = active.renderer.resource_by_url(&url) else {
            debug!(trace = %active.trace, url = %url, "resource not recorded");
            return Ok(None);
        };
        let body = match &record.response.content.sha1 {
            Some(sha1) => resource_for_sha1(active.archive.as_ref(), sha1)
                .await?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        Ok(Some(ResolvedResource { record, body }))
    }

    /// Evicts traces and active snapshots of sessions that are gone.
    /// Returns the number of evicted traces.
    pub async fn gc(&self) -> usize {
        let Some(presence) = &self.presence else {
            return 0;
        };

        let owners: Vec<(TraceId, SessionId)> = self
            .traces
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().owner.clone()))
            .collect();
        let mut evicted = 0;
        for (trace, owner) in owners {
            if presence.is_alive(&owner).await {
                continue;
            }
            if self
                .traces
                .remove_if(&trace, |_, loaded| loaded.owner == owner)
                .is_some()
            {
                evicted += 1;
            }
        }

        let sessions: Vec<SessionId> = self.active.iter().map(|e| e.key().clone()).collect();
        for session in sessions {
            if !presence.is_alive(&session).await {
                self.active.remove(&session);
            }
        }

        if evicted > 0 {
            debug!(evicted, remaining = self.traces.len(), "trace cache gc");
        }
        evicted
    }
}

/// Drops the `#fragment` part. The rest of the URL is kept byte for byte so
/// it still matches the recorded request URL exactly.
pub fn strip_fragment(raw: &str) -> String {
    raw.split_once('#')
        .map(|(head, _)| head.to_string())
        .unwrap_or_else(|| raw.to_string())
}
