//! Forward migration of trace records between schema versions.
//!
//! Each step rewrites a decoded JSON record from version `v` to `v + 1`.
//! Records of kinds a step does not touch pass through unchanged.

use serde_json::{json, Map, Value};

use crate::errors::{LogError, LogResult};

pub const CURRENT_VERSION: u32 = 3;

/// Actions recorded by version 0 tracers that captured DOM snapshots.
pub const SNAPSHOT_CAPTURING_METHODS: &[&str] = &[
    "EventTarget.waitForEventInfo",
    "BrowserContext.waitForEventInfo",
    "Page.waitForEventInfo",
    "WebSocket.waitForEventInfo",
    "ElectronApplication.waitForEventInfo",
    "AndroidDevice.waitForEventInfo",
    "Page.goBack",
    "Page.goForward",
    "Page.reload",
    "Page.setViewportSize",
    "Page.keyboardDown",
    "Page.keyboardUp",
    "Page.keyboardInsertText",
    "Page.keyboardType",
    "Page.keyboardPress",
    "Page.mouseMove",
    "Page.mouseDown",
    "Page.mouseUp",
    "Page.mouseClick",
    "Page.mouseWheel",
    "Page.touchscreenTap",
    "Frame.evalOnSelector",
    "Frame.evalOnSelectorAll",
    "Frame.addScriptTag",
    "Frame.addStyleTag",
    "Frame.check",
    "Frame.click",
    "Frame.dragAndDrop",
    "Frame.dblclick",
    "Frame.dispatchEvent",
    "Frame.evaluateExpression",
    "Frame.evaluateExpressionHandle",
    "Frame.fill",
    "Frame.focus",
    "Frame.getAttribute",
    "Frame.goto",
    "Frame.hover",
    "Frame.innerHTML",
    "Frame.innerText",
    "Frame.inputValue",
    "Frame.isChecked",
    "Frame.isDisabled",
    "Frame.isEnabled",
    "Frame.isHidden",
    "Frame.isVisible",
    "Frame.isEditable",
    "Frame.press",
    "Frame.selectOption",
    "Frame.setContent",
    "Frame.setInputFiles",
    "Frame.tap",
    "Frame.textContent",
    "Frame.type",
    "Frame.uncheck",
    "Frame.waitForTimeout",
    "Frame.waitForFunction",
    "Frame.waitForSelector",
    "Frame.expect",
    "JSHandle.evaluateExpression",
    "ElementHandle.evaluateExpression",
    "JSHandle.evaluateExpressionHandle",
    "ElementHandle.evaluateExpressionHandle",
    "ElementHandle.evalOnSelector",
    "ElementHandle.evalOnSelectorAll",
    "ElementHandle.check",
    "ElementHandle.click",
    "ElementHandle.dblclick",
    "ElementHandle.dispatchEvent",
    "ElementHandle.fill",
    "ElementHandle.hover",
    "ElementHandle.innerHTML",
    "ElementHandle.innerText",
    "ElementHandle.inputValue",
    "ElementHandle.isChecked",
    "ElementHandle.isDisabled",
    "ElementHandle.isEditable",
    "ElementHandle.isEnabled",
    "ElementHandle.isHidden",
    "ElementHandle.isVisible",
    "ElementHandle.press",
    "ElementHandle.scrollIntoViewIfNeeded",
    "ElementHandle.selectOption",
    "ElementHandle.selectText",
    "ElementHandle.setInputFiles",
    "ElementHandle.tap",
    "ElementHandle.textContent",
    "ElementHandle.type",
    "ElementHandle.uncheck",
    "ElementHandle.waitForElementState",
    "ElementHandle.waitForSelector",
];

pub fn captures_snapshot(object_type: &str, method: &str) -> bool {
    SNAPSHOT_CAPTURING_METHODS.iter().any(|entry| {
        entry
            .split_once('.')
            .map(|(ty, m)| ty == object_type && m == method)
            .unwrap_or(false)
    })
}

/// Fails for versions newer than [`CURRENT_VERSION`].
pub fn check_version(version: u32) -> LogResult<()> {
    if version > CURRENT_VERSION {
        return Err(LogError::UnsupportedVersion {
            found: version,
            latest: CURRENT_VERSION,
        });
    }
    Ok(())
}

/// Brings `record` from `from_version` up to [`CURRENT_VERSION`].
///
/// `context_options` are the options of the context-options record seen
/// earlier in the same log; the 1 -> 2 step reads the recorded viewport from
/// them.
pub fn migrate(record: Value, from_version: u32, context_options: &Value) -> LogResult<Value> {
    check_version(from_version)?;
    let mut record = record;
    for version in from_version..CURRENT_VERSION {
        record = match version {
            0 => v0_to_v1(record),
            1 => v1_to_v2(record, context_options),
            2 => v2_to_v3(record),
            other => return Err(LogError::Internal(format!("no migration from {other}"))),
        };
    }
    Ok(record)
}

fn record_type(record: &Value) -> Option<&str> {
    record.get("type").and_then(Value::as_str)
}

fn v0_to_v1(mut record: Value) -> Value {
    if record_type(&record) != Some("action") {
        return record;
    }
    let derived = record.get("metadata").map(|metadata| {
        let text = |key: &str| metadata.get(key).and_then(Value::as_str).unwrap_or("");
        captures_snapshot(text("type"), text("method"))
    });
    if let Some(metadata) = record.get_mut("metadata").and_then(Value::as_object_mut) {
        let message = metadata.get("error").and_then(Value::as_str).map(str::to_owned);
        if let Some(message) = message {
            metadata.insert("error".into(), json!({ "name": "Error", "message": message }));
        }
    }
    if let Some(object) = record.as_object_mut() {
        let has_flag = matches!(object.get("hasSnapshot"), Some(Value::Bool(_)));
        if let (false, Some(derived)) = (has_flag, derived) {
            object.insert("hasSnapshot".into(), Value::Bool(derived));
        }
    }
    record
}

fn v1_to_v2(mut record: Value, context_options: &Value) -> Value {
    if record_type(&record) != Some("frame-snapshot") {
        return record;
    }
    let viewport = context_options
        .get("viewport")
        .filter(|viewport| viewport.is_object())
        .cloned()
        .unwrap_or_else(|| json!({ "width": 1280, "height": 720 }));
    if let Some(snapshot) = record.get_mut("snapshot").and_then(Value::as_object_mut) {
        let is_main = snapshot
            .get("isMainFrame")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let recorded = matches!(snapshot.get("viewport"), Some(v) if !v.is_null());
        if is_main && !recorded {
            snapshot.insert("viewport".into(), viewport);
        }
    }
    record
}

fn v2_to_v3(mut record: Value) -> Value {
    if record_type(&record) != Some("resource-snapshot") {
        return record;
    }
    let Some(legacy) = record.get("snapshot").and_then(Value::as_object) else {
        return record;
    };
    if legacy.contains_key("request") {
        return record;
    }
    let copy = |target: &mut Map<String, Value>, to: &str, from: &str| {
        if let Some(value) = legacy.get(from).filter(|v| !v.is_null()) {
            target.insert(to.into(), value.clone());
        }
    };

    let mut request = Map::new();
    copy(&mut request, "url", "url");
    copy(&mut request, "method", "method");
    copy(&mut request, "headers", "requestHeaders");
    if let Some(sha1) = legacy.get("requestSha1").filter(|v| !v.is_null()) {
        request.insert("postData".into(), json!({ "_sha1": sha1 }));
    }

    let mut content = Map::new();
    copy(&mut content, "mimeType", "contentType");
    copy(&mut content, "_sha1", "responseSha1");

    let mut response = Map::new();
    copy(&mut response, "status", "status");
    copy(&mut response, "headers", "responseHeaders");
    response.insert("content".into(), Value::Object(content));

    let mut rebuilt = Map::new();
    copy(&mut rebuilt, "_frameref", "frameId");
    rebuilt.insert("request".into(), Value::Object(request));
    rebuilt.insert("response".into(), Value::Object(response));
    copy(&mut rebuilt, "_monotonicTime", "timestamp");

    if let Some(object) = record.as_object_mut() {
        object.insert("snapshot".into(), Value::Object(rebuilt));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_version_is_a_no_op() {
        let record = json!({"type": "action", "metadata": {"error": "boom"}});
        let out = migrate(record.clone(), CURRENT_VERSION, &Value::Null).unwrap();
        assert_eq!(out, record);
        let again = migrate(out.clone(), CURRENT_VERSION, &Value::Null).unwrap();
        assert_eq!(again, out);
    }

    #[test]
    fn future_version_fails_closed() {
        let err = migrate(json!({}), 4, &Value::Null).unwrap_err();
        assert_eq!(err, LogError::UnsupportedVersion { found: 4, latest: 3 });
    }

    #[test]
    fn string_error_becomes_object() {
        let out = v0_to_v1(json!({
            "type": "action",
            "metadata": {"type": "Frame", "method": "click", "error": "timeout"},
        }));
        assert_eq!(
            out["metadata"]["error"],
            json!({"name": "Error", "message": "timeout"})
        );
    }

    #[test]
    fn has_snapshot_is_derived_from_allow_list() {
        let click = v0_to_v1(json!({
            "type": "action",
            "metadata": {"type": "Frame", "method": "click"},
        }));
        assert_eq!(click["hasSnapshot"], json!(true));

        let title = v0_to_v1(json!({
            "type": "action",
            "metadata": {"type": "Frame", "method": "title"},
        }));
        assert_eq!(title["hasSnapshot"], json!(false));

        let explicit = v0_to_v1(json!({
            "type": "action",
            "hasSnapshot": false,
            "metadata": {"type": "Frame", "method": "click"},
        }));
        assert_eq!(explicit["hasSnapshot"], json!(false));
    }

    #[test]
    fn missing_main_frame_viewport_comes_from_options() {
        let record = json!({"type": "frame-snapshot", "snapshot": {"isMainFrame": true}});
        let options = json!({"viewport": {"width": 390, "height": 844}});
        let out = v1_to_v2(record.clone(), &options);
        assert_eq!(out["snapshot"]["viewport"], json!({"width": 390, "height": 844}));

        let out = v1_to_v2(record, &json!({}));
        assert_eq!(out["snapshot"]["viewport"], json!({"width": 1280, "height": 720}));

        let null_viewport = json!({
            "type": "frame-snapshot",
            "snapshot": {"isMainFrame": true, "viewport": null},
        });
        let out = v1_to_v2(null_viewport, &json!({}));
        assert_eq!(out["snapshot"]["viewport"], json!({"width": 1280, "height": 720}));
    }

    #[test]
    fn recorded_main_frame_viewport_is_kept() {
        let record = json!({
            "type": "frame-snapshot",
            "snapshot": {"isMainFrame": true, "viewport": {"width": 390, "height": 844}},
        });
        let options = json!({"viewport": {"width": 1024, "height": 768}});
        assert_eq!(v1_to_v2(record.clone(), &options), record);
    }

    #[test]
    fn child_frame_viewport_is_untouched() {
        let record = json!({"type": "frame-snapshot", "snapshot": {"isMainFrame": false}});
        assert_eq!(v1_to_v2(record.clone(), &Value::Null), record);
    }

    #[test]
    fn legacy_resource_is_nested() {
        let out = v2_to_v3(json!({
            "type": "resource-snapshot",
            "snapshot": {
                "frameId": "frame@1",
                "url": "https://a/app.js",
                "method": "GET",
                "requestHeaders": [{"name": "accept", "value": "*/*"}],
                "status": 200,
                "responseHeaders": [],
                "contentType": "text/css",
                "responseSha1": "deadbeef",
                "timestamp": 12.5,
            },
        }));
        let snapshot = &out["snapshot"];
        assert_eq!(snapshot["_frameref"], json!("frame@1"));
        assert_eq!(snapshot["request"]["url"], json!("https://a/app.js"));
        assert!(snapshot["request"].get("postData").is_none());
        assert_eq!(snapshot["response"]["content"]["mimeType"], json!("text/css"));
        assert_eq!(snapshot["response"]["content"]["_sha1"], json!("deadbeef"));
        assert_eq!(snapshot["_monotonicTime"], json!(12.5));
    }

    #[test]
    fn nested_resource_passes_through() {
        let record = json!({
            "type": "resource-snapshot",
            "snapshot": {"request": {"url": "x"}, "response": {}},
        });
        assert_eq!(v2_to_v3(record.clone()), record);
    }

    #[test]
    fn full_chain_applies_every_step() {
        let options = json!({"viewport": {"width": 800, "height": 600}});
        let frame = migrate(
            json!({"type": "frame-snapshot", "snapshot": {"isMainFrame": true}}),
            0,
            &options,
        )
        .unwrap();
        assert_eq!(frame["snapshot"]["viewport"]["width"], json!(800));

        let resource = migrate(
            json!({"type": "resource-snapshot", "snapshot": {"url": "u", "requestSha1": "r"}}),
            1,
            &options,
        )
        .unwrap();
        assert_eq!(resource["snapshot"]["request"]["postData"]["_sha1"], json!("r"));
    }
}
