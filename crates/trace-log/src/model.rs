use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use traceview_core_types::PageId;
use traceview_snapshot_store::{FrameSnapshot, ResourceSnapshot};

/// One decoded record of a trace or network log, after migration.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TraceEvent {
    ContextOptions(ContextOptions),
    ScreencastFrame(ScreencastFrame),
    Action(ActionEvent),
    Event(EventRecord),
    ResourceSnapshot { snapshot: ResourceSnapshot },
    FrameSnapshot { snapshot: FrameSnapshot },
}

impl TraceEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::ContextOptions(_) => "context-options",
            TraceEvent::ScreencastFrame(_) => "screencast-frame",
            TraceEvent::Action(_) => "action",
            TraceEvent::Event(_) => "event",
            TraceEvent::ResourceSnapshot { .. } => "resource-snapshot",
            TraceEvent::FrameSnapshot { .. } => "frame-snapshot",
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub browser_name: String,
    #[serde(default)]
    pub options: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastFrame {
    pub page_id: PageId,
    pub sha1: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub timestamp: f64,
}

/// Metadata of a protocol call, shared by actions and events.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<PageId>,
    #[serde(rename = "type", default)]
    pub object_type: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    pub metadata: CallMetadata,
    #[serde(default)]
    pub has_snapshot: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub metadata: CallMetadata,
}

/// Per-page aggregate. Created on first reference, never removed.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    pub page_id: PageId,
    pub actions: Vec<ActionEvent>,
    pub events: Vec<EventRecord>,
    pub objects: BTreeMap<String, Value>,
    pub screencast_frames: Vec<ScreencastFrame>,
}

impl PageEntry {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            ..Self::default()
        }
    }
}

/// Aggregate of one loaded trace.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    pub start_time: f64,
    pub end_time: f64,
    pub browser_name: String,
    pub options: Value,
    pub pages: Vec<PageEntry>,
    pub resources: Vec<Arc<ResourceSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub has_source: bool,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self {
            start_time: f64::MAX,
            end_time: 0.0,
            browser_name: String::new(),
            options: Value::Object(Map::new()),
            pages: Vec::new(),
            resources: Vec::new(),
            version: None,
            has_source: false,
        }
    }
}

impl TraceContext {
    pub fn page(&self, page_id: &str) -> Option<&PageEntry> {
        self.pages.iter().find(|page| page.page_id.as_str() == page_id)
    }

    pub fn page_mut(&mut self, page_id: &PageId) -> &mut PageEntry {
        let position = self.pages.iter().position(|page| &page.page_id == page_id);
        let idx = match position {
            Some(idx) => idx,
            None => {
                self.pages.push(PageEntry::new(page_id.clone()));
                self.pages.len() - 1
            }
        };
        &mut self.pages[idx]
    }

    pub fn widen(&mut self, metadata: &CallMetadata) {
        self.start_time = self.start_time.min(metadata.start_time);
        self.end_time = self.end_time.max(metadata.end_time);
    }

    pub fn action_count(&self) -> usize {
        self.pages.iter().map(|page| page.actions.len()).sum()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestStats {
    pub lines: u64,
    pub malformed: u64,
    pub dropped_actions: u64,
    pub dropped_events: u64,
    pub frame_snapshots: u64,
    pub resources: u64,
}
