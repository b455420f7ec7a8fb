use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use traceview_event_bus::{Observer, ObserverList};

use crate::errors::{SnapErrKind, SnapResult};
use crate::metrics::{SnapMetrics, SnapMetricsSnapshot};
use crate::model::{FrameSnapshot, ResourceSnapshot, SnapshotAdded};
use crate::render::{ResourceLog, SnapshotLog, SnapshotRenderer};

#[derive(Default)]
struct FrameEntry {
    raw: SnapshotLog,
    renderers: RwLock<Vec<Arc<SnapshotRenderer>>>,
}

/// Indexed collection of frame snapshots and the resource log of one trace.
#[derive(Default)]
pub struct SnapshotStore {
    resources: ResourceLog,
    /// Keyed by frame id; main frames are also reachable by their page id.
    frames: DashMap<String, Arc<FrameEntry>>,
    observers: ObserverList<SnapshotAdded>,
    metrics: SnapMetrics,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer<SnapshotAdded>>) {
        self.observers.subscribe(observer);
    }

    pub fn add_resource(&self, resource: ResourceSnapshot) {
        self.resources.write().push(Arc::new(resource));
        self.metrics.record_resource();
    }

    pub fn add_frame_snapshot(&self, snapshot: FrameSnapshot) -> SnapResult<Arc<SnapshotRenderer>> {
        let entry = self.frame_entry(&snapshot);
        let event_base = SnapshotAdded {
            frame_id: snapshot.frame_id.clone(),
            page_id: snapshot.page_id.clone(),
            index: 0,
            snapshot_name: snapshot.snapshot_name.clone(),
        };

        let index = {
            let mut raw = entry.raw.write();
            raw.push(Arc::new(snapshot));
            raw.len() - 1
        };
        let renderer = SnapshotRenderer::new(self.resources.clone(), entry.raw.clone(), index)
            .map(Arc::new)
            .ok_or_else(|| SnapErrKind::Internal(format!("snapshot {index} vanished")))?;
        entry.renderers.write().push(Arc::clone(&renderer));
        self.metrics.record_frame_snapshot();

        let event = SnapshotAdded {
            index,
            ..event_base
        };
        debug!(frame = %event.frame_id, index, "frame snapshot added");
        self.observers.emit(&event);
        Ok(renderer)
    }

    fn frame_entry(&self, snapshot: &FrameSnapshot) -> Arc<FrameEntry> {
        if let Some(entry) = self.frames.get(snapshot.frame_id.as_str()) {
            return Arc::clone(entry.value());
        }
        let entry = Arc::new(FrameEntry::default());
        self.frames
            .insert(snapshot.frame_id.0.clone(), Arc::clone(&entry));
        if snapshot.is_main_frame {
            self.frames
                .insert(snapshot.page_id.0.clone(), Arc::clone(&entry));
        }
        entry
    }

    /// First snapshot of the frame (or main frame of the page) with the given name.
    pub fn by_name(&self, frame_or_page: &str, name: &str) -> SnapResult<Arc<SnapshotRenderer>> {
        let entry = self.lookup(frame_or_page)?;
        let found = entry
            .renderers
            .read()
            .iter()
            .find(|renderer| renderer.snapshot_name() == Some(name))
            .cloned();
        found.ok_or_else(|| {
            self.metrics.record_miss();
            SnapErrKind::SnapshotNotFound(format!("{frame_or_page}/{name}")).into()
        })
    }

    pub fn by_index(&self, frame_id: &str, index: usize) -> SnapResult<Arc<SnapshotRenderer>> {
        let entry = self.lookup(frame_id)?;
        let found = entry.renderers.read().get(index).cloned();
        found.ok_or_else(|| {
            self.metrics.record_miss();
            SnapErrKind::SnapshotNotFound(format!("{frame_id}#{index}")).into()
        })
    }

    fn lookup(&self, frame_or_page: &str) -> SnapResult<Arc<FrameEntry>> {
        match self.frames.get(frame_or_page) {
            Some(entry) => Ok(Arc::clone(entry.value())),
            None => {
                self.metrics.record_miss();
                Err(SnapErrKind::FrameNotFound(frame_or_page.to_string()).into())
            }
        }
    }

    /// Copy of the resource log in capture order.
    pub fn resources(&self) -> Vec<Arc<ResourceSnapshot>> {
        self.resources.read().clone()
    }

    /// Keys the store answers to, frame ids and aliased page ids alike.
    pub fn frame_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.frames.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn snapshot_count(&self, frame_or_page: &str) -> usize {
        self.frames
            .get(frame_or_page)
            .map(|entry| entry.raw.read().len())
            .unwrap_or(0)
    }

    pub fn metrics(&self) -> SnapMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SnapErrKind;
    use serde_json::{json, Value};

    fn frame_snapshot(value: Value) -> FrameSnapshot {
        serde_json::from_value(value).expect("frame snapshot")
    }

    fn main_frame(name: &str, html: Value) -> FrameSnapshot {
        frame_snapshot(json!({
            "snapshotName": name,
            "pageId": "page@1",
            "frameId": "frame@main",
            "isMainFrame": true,
            "timestamp": 1.0,
            "viewport": {"width": 800, "height": 600},
            "html": html,
        }))
    }

    #[test]
    fn main_frame_is_reachable_by_page_id() {
        let store = SnapshotStore::new();
        store.add_frame_snapshot(main_frame("before@1", json!("a"))).unwrap();
        let by_frame = store.by_name("frame@main", "before@1").unwrap();
        let by_page = store.by_name("page@1", "before@1").unwrap();
        assert!(Arc::ptr_eq(&by_frame, &by_page));
        assert_eq!(by_page.viewport().map(|v| v.width), Some(800));
    }

    #[test]
    fn child_frame_is_not_aliased() {
        let store = SnapshotStore::new();
        store
            .add_frame_snapshot(frame_snapshot(json!({
                "snapshotName": "s",
                "pageId": "page@2",
                "frameId": "frame@child",
                "html": "x",
            })))
            .unwrap();
        assert!(store.by_name("frame@child", "s").is_ok());
        let err = store.by_name("page@2", "s").unwrap_err();
        assert!(matches!(err.kind(), SnapErrKind::FrameNotFound(_)));
    }

    #[test]
    fn by_name_returns_first_match_and_not_found_otherwise() {
        let store = SnapshotStore::new();
        store.add_frame_snapshot(main_frame("retry", json!("first"))).unwrap();
        store.add_frame_snapshot(main_frame("retry", json!("second"))).unwrap();
        assert_eq!(store.by_name("page@1", "retry").unwrap().index(), 0);
        let err = store.by_name("page@1", "missing").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.by_name("nope", "retry").is_err());
    }

    #[test]
    fn by_index_follows_arrival_order() {
        let store = SnapshotStore::new();
        for name in ["a", "b", "c"] {
            store.add_frame_snapshot(main_frame(name, json!(name))).unwrap();
        }
        assert_eq!(store.by_index("frame@main", 2).unwrap().snapshot_name(), Some("c"));
        assert!(store.by_index("frame@main", 3).is_err());
        assert_eq!(store.snapshot_count("page@1"), 3);
    }

    #[test]
    fn observers_hear_each_snapshot() {
        let store = SnapshotStore::new();
        let seen = Arc::new(RwLock::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(Arc::new(move |ev: &SnapshotAdded| {
            sink.write().push((ev.index, ev.snapshot_name.clone()))
        }));
        store.add_frame_snapshot(main_frame("a", json!("1"))).unwrap();
        store.add_frame_snapshot(main_frame("b", json!("2"))).unwrap();
        assert_eq!(
            *seen.read(),
            vec![(0, Some("a".to_string())), (1, Some("b".to_string()))]
        );
    }

    #[test]
    fn resources_returns_a_copy() {
        let store = SnapshotStore::new();
        store.add_resource(
            serde_json::from_value(json!({
                "_frameref": "frame@main",
                "request": {"url": "https://a/"},
                "response": {"status": 200},
                "_monotonicTime": 0.5,
            }))
            .unwrap(),
        );
        let mut copy = store.resources();
        copy.clear();
        assert_eq!(store.resources().len(), 1);
        assert_eq!(store.metrics().resources, 1);
    }

    #[test]
    fn renderer_resolves_against_store_resources() {
        let store = SnapshotStore::new();
        let renderer = store.add_frame_snapshot(main_frame("a", json!("x"))).unwrap();
        // Resources appended after the renderer was created are still visible to it.
        store.add_resource(
            serde_json::from_value(json!({
                "_frameref": "frame@main",
                "request": {"url": "https://a/app.js"},
                "response": {"status": 200, "content": {"mimeType": "application/javascript", "_sha1": "abc"}},
                "_monotonicTime": 0.5,
            }))
            .unwrap(),
        );
        let found = renderer.resource_by_url("https://a/app.js").unwrap();
        assert_eq!(found.response.content.sha1.as_deref(), Some("abc"));
    }
}
