use std::sync::Arc;

use crate::model::{FrameSnapshot, ResourceSnapshot};

/// Finds the resource a snapshot saw for `url`.
///
/// The log is in capture order, so the scan stops at the first resource that
/// was captured at or after the snapshot. Resources from the snapshot's own
/// frame win; otherwise the first eligible resource with the same URL from any
/// frame is used (the memory cache may have served it). A snapshot-local
/// override with a content hash replaces the response body of the result.
pub fn resolve_resource(
    resources: &[Arc<ResourceSnapshot>],
    snapshot: &FrameSnapshot,
    url: &str,
) -> Option<Arc<ResourceSnapshot>> {
    let eligible = || {
        resources
            .iter()
            .take_while(|resource| captured_before(resource, snapshot.timestamp))
    };

    let found = eligible()
        .find(|resource| resource.frame_ref == snapshot.frame_id && resource.request.url == url)
        .or_else(|| eligible().find(|resource| resource.request.url == url))?;

    let replacement = snapshot
        .resource_overrides
        .iter()
        .find(|o| o.url == url && o.sha1.is_some())
        .and_then(|o| o.sha1.clone());

    match replacement {
        Some(sha1) => {
            let mut patched = ResourceSnapshot::clone(found);
            patched.response.content.sha1 = Some(sha1);
            Some(Arc::new(patched))
        }
        None => Some(Arc::clone(found)),
    }
}

fn captured_before(resource: &ResourceSnapshot, timestamp: f64) -> bool {
    match resource.monotonic_time {
        Some(time) => time < timestamp,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn resource(frame: &str, url: &str, time: f64, sha1: &str) -> Arc<ResourceSnapshot> {
        Arc::new(
            serde_json::from_value(json!({
                "_frameref": frame,
                "request": {"url": url, "method": "GET", "headers": []},
                "response": {
                    "status": 200,
                    "headers": [],
                    "content": {"mimeType": "text/css", "_sha1": sha1},
                },
                "_monotonicTime": time,
            }))
            .unwrap(),
        )
    }

    fn snapshot(frame: &str, timestamp: f64, overrides: Value) -> FrameSnapshot {
        serde_json::from_value(json!({
            "pageId": "page@1",
            "frameId": frame,
            "timestamp": timestamp,
            "html": "x",
            "resourceOverrides": overrides,
        }))
        .unwrap()
    }

    fn sha1(found: Option<Arc<ResourceSnapshot>>) -> Option<String> {
        found.and_then(|r| r.response.content.sha1.clone())
    }

    #[test]
    fn later_resource_is_never_returned() {
        let log = vec![
            resource("frame@1", "https://a/style.css", 5.0, "early"),
            resource("frame@1", "https://a/style.css", 15.0, "late"),
        ];
        let snap = snapshot("frame@1", 10.0, json!([]));
        assert_eq!(
            sha1(resolve_resource(&log, &snap, "https://a/style.css")),
            Some("early".into())
        );
    }

    #[test]
    fn resource_at_snapshot_time_is_excluded() {
        let log = vec![resource("frame@1", "https://a/x.js", 10.0, "same")];
        let snap = snapshot("frame@1", 10.0, json!([]));
        assert!(resolve_resource(&log, &snap, "https://a/x.js").is_none());
    }

    #[test]
    fn own_frame_beats_other_frames() {
        let log = vec![
            resource("frame@2", "https://a/x.js", 1.0, "other"),
            resource("frame@1", "https://a/x.js", 2.0, "own"),
        ];
        let snap = snapshot("frame@1", 10.0, json!([]));
        assert_eq!(
            sha1(resolve_resource(&log, &snap, "https://a/x.js")),
            Some("own".into())
        );
    }

    #[test]
    fn cross_frame_fallback_takes_first_match() {
        let log = vec![
            resource("frame@2", "https://a/x.js", 1.0, "first"),
            resource("frame@3", "https://a/x.js", 2.0, "second"),
        ];
        let snap = snapshot("frame@1", 10.0, json!([]));
        assert_eq!(
            sha1(resolve_resource(&log, &snap, "https://a/x.js")),
            Some("first".into())
        );
    }

    #[test]
    fn override_patches_a_copy() {
        let log = vec![resource("frame@1", "https://a/x.css", 1.0, "orig")];
        let snap = snapshot(
            "frame@1",
            10.0,
            json!([
                {"url": "https://a/x.css"},
                {"url": "https://a/x.css", "sha1": "patched"},
                {"url": "https://a/x.css", "sha1": "ignored"},
            ]),
        );
        assert_eq!(
            sha1(resolve_resource(&log, &snap, "https://a/x.css")),
            Some("patched".into())
        );
        assert_eq!(log[0].response.content.sha1.as_deref(), Some("orig"));
    }

    #[test]
    fn unknown_url_is_none() {
        let log = vec![resource("frame@1", "https://a/x.css", 1.0, "orig")];
        let snap = snapshot("frame@1", 10.0, json!([]));
        assert!(resolve_resource(&log, &snap, "https://a/y.css").is_none());
    }
}
