use serde::{Deserialize, Serialize};
use traceview_core_types::{FrameId, PageId};

use crate::node::NodeTree;

/// Name/value pair as recorded in HAR-style header lists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// One recorded network exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    #[serde(rename = "_frameref", default)]
    pub frame_ref: FrameId,
    pub request: ResourceRequest,
    pub response: ResourceResponse,
    #[serde(
        rename = "_monotonicTime",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub monotonic_time: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    #[serde(rename = "_sha1", default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub content: ResponseContent,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseContent {
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(rename = "_sha1", default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

/// Snapshot-local replacement of a resource body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOverride {
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(rename = "ref", default)]
    pub reference: Option<i64>,
}

/// One DOM capture for one frame at one moment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    #[serde(default)]
    pub snapshot_name: Option<String>,
    #[serde(default)]
    pub call_id: String,
    pub page_id: PageId,
    pub frame_id: FrameId,
    #[serde(default)]
    pub frame_url: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub doctype: Option<String>,
    pub html: NodeTree,
    #[serde(default)]
    pub resource_overrides: Vec<ResourceOverride>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub is_main_frame: bool,
}

/// Output of [`crate::SnapshotRenderer::render`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedFrameSnapshot {
    pub html: String,
    pub page_id: PageId,
    pub frame_id: FrameId,
    pub index: usize,
}

/// Notification emitted whenever a frame snapshot lands in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotAdded {
    pub frame_id: FrameId,
    pub page_id: PageId,
    pub index: usize,
    pub snapshot_name: Option<String>,
}
