use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::timeout;
use traceview_core_types::{SessionId, TraceId};
use traceview_replay_router::{
    FsArchiveOpener, RouteRequest, RouterPolicyView, SessionLeases, TraceRouter,
};

async fn write_log(dir: &Path, name: &str, lines: &[Value]) {
    let text: Vec<String> = lines.iter().map(Value::to_string).collect();
    tokio::fs::write(dir.join(name), text.join("\n")).await.unwrap();
}

/// Trace with two snapshots of one page; a stylesheet is recorded before the
/// first snapshot and a script between the two.
async fn sample_trace(root: &Path, name: &str) {
    let dir = root.join(name);
    tokio::fs::create_dir_all(dir.join("resources")).await.unwrap();
    write_log(
        &dir,
        "trace.trace",
        &[
            json!({"type": "context-options", "version": 3, "browserName": "chromium",
                   "options": {"viewport": {"width": 1024, "height": 768}}}),
            json!({"type": "action", "hasSnapshot": true, "metadata": {
                "id": "call@1", "startTime": 1.0, "endTime": 4.0, "pageId": "page@1",
                "type": "Frame", "method": "goto", "params": {"url": "https://site.test/"}}}),
            json!({"type": "frame-snapshot", "snapshot": {
                "snapshotName": "before@call@1", "callId": "call@1",
                "pageId": "page@1", "frameId": "frame@1", "isMainFrame": true,
                "timestamp": 5.0, "doctype": "html",
                "viewport": {"width": 1024, "height": 768},
                "html": ["HTML", {}, ["HEAD", {}, ["LINK", {"rel": "stylesheet", "href": "style.css"}]],
                         ["BODY", {}, "first"]]}}),
            json!({"type": "frame-snapshot", "snapshot": {
                "snapshotName": "after@call@1", "callId": "call@1",
                "pageId": "page@1", "frameId": "frame@1", "isMainFrame": true,
                "timestamp": 9.0, "doctype": "html",
                "viewport": {"width": 1024, "height": 768},
                "html": ["HTML", {}, [[1, 1]], ["BODY", {}, "second"]]}}),
        ],
    )
    .await;
    write_log(
        &dir,
        "trace.network",
        &[
            json!({"type": "resource-snapshot", "snapshot": {
                "_frameref": "frame@1",
                "request": {"url": "https://site.test/style.css", "method": "GET", "headers": []},
                "response": {"status": 200, "headers": [{"name": "Content-Encoding", "value": "br"}],
                             "content": {"mimeType": "text/css", "_sha1": "css-v1"}},
                "_monotonicTime": 3.0}}),
            json!({"type": "resource-snapshot", "snapshot": {
                "_frameref": "frame@1",
                "request": {"url": "https://site.test/late.js", "method": "GET", "headers": []},
                "response": {"status": 200, "headers": [],
                             "content": {"mimeType": "application/javascript", "_sha1": "js-v1"}},
                "_monotonicTime": 7.0}}),
        ],
    )
    .await;
    tokio::fs::write(dir.join("resources/css-v1"), "body{color:red}").await.unwrap();
    tokio::fs::write(dir.join("resources/js-v1"), "run();").await.unwrap();
}

fn scoped(session: &str, path: &str, params: &[(&str, &str)]) -> RouteRequest {
    RouteRequest::Scoped {
        session: SessionId::from(session),
        path: path.to_string(),
        params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn resource(session: &str, url: &str) -> RouteRequest {
    RouteRequest::Resource {
        session: SessionId::from(session),
        url: url.to_string(),
    }
}

fn router(root: &Path) -> TraceRouter {
    let opener = FsArchiveOpener::new(Some(root.to_path_buf()));
    TraceRouter::new(Arc::new(opener), &RouterPolicyView::default())
}

#[tokio::test]
async fn context_is_loaded_lazily_and_cached() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "run").await;
    let router = router(root.path());

    let response = router
        .dispatch(scoped("s1", "/context", &[("trace", "run")]))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("application/json"));
    let context: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(context["browserName"], json!("chromium"));
    assert_eq!(context["startTime"], json!(1.0));
    assert_eq!(context["resources"].as_array().map(Vec::len), Some(2));

    let first = router.loaded(&TraceId::from("run")).unwrap();
    router
        .dispatch(scoped("s2", "/context", &[("trace", "run")]))
        .await;
    let second = router.loaded(&TraceId::from("run")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.owner, SessionId::from("s1"));
}

#[tokio::test]
async fn unknown_trace_is_not_found_and_caches_nothing() {
    let root = tempfile::tempdir().unwrap();
    let router = router(root.path());
    let response = router
        .dispatch(scoped("s1", "/context", &[("trace", "missing")]))
        .await;
    assert_eq!(response.status, 404);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("missing"));
    assert_eq!(router.loaded_count(), 0);
}

#[tokio::test]
async fn failed_load_reports_error_and_caches_nothing() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("future");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    write_log(
        &dir,
        "trace.trace",
        &[json!({"type": "context-options", "version": 99, "browserName": "chromium"})],
    )
    .await;
    let router = router(root.path());
    let response = router
        .dispatch(scoped("s1", "/context", &[("trace", "future")]))
        .await;
    assert_eq!(response.status, 500);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("99"));
    assert_eq!(router.loaded_count(), 0);
}

#[tokio::test]
async fn snapshot_renders_html_and_sizes_are_cached_forever() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "run").await;
    let router = router(root.path());

    let size = router
        .dispatch(scoped(
            "s1",
            "/snapshotSize/page@1",
            &[("trace", "run"), ("name", "after@call@1")],
        ))
        .await;
    assert_eq!(size.status, 200);
    assert_eq!(size.header("Cache-Control"), Some("public, max-age=31536000"));
    let body: Value = serde_json::from_slice(&size.body).unwrap();
    assert_eq!(body, json!({"width": 1024, "height": 768}));

    let unknown = router
        .dispatch(scoped(
            "s1",
            "/snapshotSize/page@1",
            &[("trace", "run"), ("name", "nope")],
        ))
        .await;
    assert_eq!(serde_json::from_slice::<Value>(&unknown.body).unwrap(), json!({}));

    let html = router
        .dispatch(scoped(
            "s1",
            "/snapshot/page@1",
            &[("trace", "run"), ("name", "after@call@1")],
        ))
        .await;
    assert_eq!(html.status, 200);
    assert_eq!(html.header("Content-Type"), Some("text/html"));
    let text = String::from_utf8(html.body).unwrap();
    assert!(text.starts_with(
        "<!DOCTYPE html><HTML><HEAD><LINK rel=\"stylesheet\" href=\"style.css\"></HEAD><BODY>second</BODY></HTML>"
    ));
    assert!(text.contains("__playwright_target__=\"call@1\""));

    let missing = router
        .dispatch(scoped(
            "s1",
            "/snapshot/page@1",
            &[("trace", "run"), ("name", "nope")],
        ))
        .await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn resources_follow_the_active_snapshot() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "run").await;
    let router = router(root.path());

    assert_eq!(
        router
            .dispatch(resource("s1", "https://site.test/style.css"))
            .await
            .status,
        404
    );

    router
        .dispatch(scoped(
            "s1",
            "/snapshot/page@1",
            &[("trace", "run"), ("name", "before@call@1")],
        ))
        .await;
    let early = router
        .dispatch(resource("s1", "https://site.test/style.css#section"))
        .await;
    assert_eq!(early.status, 200);
    assert_eq!(early.body, b"body{color:red}");
    assert_eq!(early.header("Content-Type"), Some("text/css; charset=utf-8"));
    assert_eq!(early.header("Content-Encoding"), None);
    assert_eq!(early.header("Content-Length"), Some("15"));

    let not_yet = router
        .dispatch(resource("s1", "https://site.test/late.js"))
        .await;
    assert_eq!(not_yet.status, 404);

    router
        .dispatch(scoped(
            "s1",
            "/snapshot/page@1",
            &[("trace", "run"), ("name", "after@call@1")],
        ))
        .await;
    let late = router
        .dispatch(resource("s1", "https://site.test/late.js"))
        .await;
    assert_eq!(late.status, 200);
    assert_eq!(late.body, b"run();");
    assert_eq!(
        late.header("Content-Type"),
        Some("application/javascript; charset=utf-8")
    );

    // Another session has no active snapshot.
    assert_eq!(
        router
            .dispatch(resource("s2", "https://site.test/style.css"))
            .await
            .status,
        404
    );
}

#[tokio::test]
async fn sha1_lookup_scans_loaded_traces() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "run").await;
    let router = router(root.path());

    let before = router.dispatch(scoped("s1", "/sha1/js-v1", &[])).await;
    assert_eq!(before.status, 404);

    router
        .dispatch(scoped("s1", "/context", &[("trace", "run")]))
        .await;
    let after = router.dispatch(scoped("s1", "/sha1/js-v1", &[])).await;
    assert_eq!(after.status, 200);
    assert_eq!(after.body, b"run();");
}

#[tokio::test]
async fn gc_evicts_traces_of_departed_sessions() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "a").await;
    sample_trace(root.path(), "b").await;
    let leases = Arc::new(SessionLeases::new(Duration::from_secs(60)));
    let router = router(root.path()).with_presence(leases.clone());

    leases.touch(&SessionId::from("alive"));
    router
        .dispatch(scoped("alive", "/context", &[("trace", "a")]))
        .await;
    router
        .dispatch(scoped("gone", "/snapshot/page@1", &[("trace", "b"), ("name", "after@call@1")]))
        .await;
    assert_eq!(router.loaded_count(), 2);
    assert_eq!(router.active_session_count(), 1);

    assert_eq!(router.gc().await, 1);
    assert!(router.loaded(&TraceId::from("a")).is_some());
    assert!(router.loaded(&TraceId::from("b")).is_none());
    assert_eq!(router.active_session_count(), 0);
}

#[tokio::test]
async fn gc_without_presence_keeps_everything() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "a").await;
    let router = router(root.path());
    router
        .dispatch(scoped("s1", "/context", &[("trace", "a")]))
        .await;
    assert_eq!(router.dispatch(scoped("s1", "/ping", &[])).await.status, 200);
    assert_eq!(router.loaded_count(), 1);
}

#[tokio::test]
async fn snapshot_notifications_reach_bus_subscribers() {
    let root = tempfile::tempdir().unwrap();
    sample_trace(root.path(), "run").await;
    let router = router(root.path());
    let mut events = router.snapshot_events();

    router
        .dispatch(scoped("s1", "/context", &[("trace", "run")]))
        .await;
    let first = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("bus timeout")
        .expect("bus closed");
    assert_eq!(first.frame_id.as_str(), "frame@1");
    assert_eq!(first.snapshot_name.as_deref(), Some("before@call@1"));
}

#[tokio::test]
async fn unknown_scoped_path_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let router = router(root.path());
    let response = router
        .dispatch(scoped("s1", "/elsewhere", &[("trace", "run")]))
        .await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn recorded_urls_match_verbatim_after_fragment_strip() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("raw");
    tokio::fs::create_dir_all(dir.join("resources")).await.unwrap();
    write_log(
        &dir,
        "trace.trace",
        &[
            json!({"type": "context-options", "version": 3, "browserName": "chromium"}),
            json!({"type": "frame-snapshot", "snapshot": {
                "snapshotName": "s", "callId": "call@1",
                "pageId": "page@1", "frameId": "frame@1", "isMainFrame": true,
                "timestamp": 5.0, "html": ["HTML", {}]}}),
        ],
    )
    .await;
    write_log(
        &dir,
        "trace.network",
        &[json!({"type": "resource-snapshot", "snapshot": {
            "_frameref": "frame@1",
            "request": {"url": "HTTPS://Site.Test/app.js?v=%7e", "method": "GET", "headers": []},
            "response": {"status": 200, "headers": [],
                         "content": {"mimeType": "text/javascript", "_sha1": "app"}},
            "_monotonicTime": 1.0}})],
    )
    .await;
    tokio::fs::write(dir.join("resources/app"), "go();").await.unwrap();
    let router = router(root.path());

    router
        .dispatch(scoped("s1", "/snapshot/frame@1", &[("trace", "raw"), ("name", "s")]))
        .await;
    let response = router
        .dispatch(resource("s1", "HTTPS://Site.Test/app.js?v=%7e#main"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"go();");
}
