pub mod escape;
pub mod script;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::{FrameSnapshot, RenderedFrameSnapshot, ResourceSnapshot, Viewport};
use crate::node::{Node, NodeId};
use crate::resolve::resolve_resource;

use self::escape::{escape_attribute, escape_text, is_void_element};
use self::script::snapshot_trailer;

/// Shared, append-only resource log.
pub type ResourceLog = Arc<RwLock<Vec<Arc<ResourceSnapshot>>>>;
/// Shared, append-only list of snapshots for one frame.
pub type SnapshotLog = Arc<RwLock<Vec<Arc<FrameSnapshot>>>>;

const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

/// Renders one snapshot of a frame, resolving back-references into the
/// snapshots recorded before it.
#[derive(Debug)]
pub struct SnapshotRenderer {
    resources: ResourceLog,
    snapshots: SnapshotLog,
    index: usize,
    snapshot: Arc<FrameSnapshot>,
}

impl SnapshotRenderer {
    pub fn new(resources: ResourceLog, snapshots: SnapshotLog, index: usize) -> Option<Self> {
        let snapshot = snapshots.read().get(index).cloned()?;
        Some(Self {
            resources,
            snapshots,
            index,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &Arc<FrameSnapshot> {
        &self.snapshot
    }

    pub fn snapshot_name(&self) -> Option<&str> {
        self.snapshot.snapshot_name.as_deref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.snapshot.viewport
    }

    pub fn render(&self) -> RenderedFrameSnapshot {
        let snapshots = self.snapshots.read();
        let history = &snapshots[..=self.index];
        let mut pass = RenderPass {
            history,
            active: HashSet::new(),
        };
        let body = match self.snapshot.html.root() {
            Some(root) => pass.visit(self.index, root),
            None => Arc::from(""),
        };

        let html = if body.is_empty() {
            String::new()
        } else {
            let mut html = String::with_capacity(body.len() + 4096);
            if let Some(doctype) = &self.snapshot.doctype {
                html.push_str("<!DOCTYPE ");
                html.push_str(doctype);
                html.push('>');
            }
            html.push_str(&body);
            html.push_str(&snapshot_trailer(&self.snapshot.call_id));
            html
        };

        debug!(
            frame = %self.snapshot.frame_id,
            index = self.index,
            bytes = html.len(),
            "rendered frame snapshot"
        );
        RenderedFrameSnapshot {
            html,
            page_id: self.snapshot.page_id.clone(),
            frame_id: self.snapshot.frame_id.clone(),
            index: self.index,
        }
    }

    /// Best recorded resource for `url` as seen at this snapshot's capture time.
    pub fn resource_by_url(&self, url: &str) -> Option<Arc<ResourceSnapshot>> {
        let resources = self.resources.read();
        resolve_resource(&resources, &self.snapshot, url)
    }
}

struct RenderPass<'a> {
    history: &'a [Arc<FrameSnapshot>],
    /// Nodes currently being rendered; guards against self-referencing trees.
    active: HashSet<(usize, NodeId)>,
}

impl<'a> RenderPass<'a> {
    fn visit(&mut self, at: usize, id: NodeId) -> Arc<str> {
        let history = self.history;
        let Some(snapshot) = history.get(at) else {
            return Arc::from("");
        };
        let tree = &snapshot.html;
        let Some(cell) = tree.memo(id) else {
            return Arc::from("");
        };
        if let Some(cached) = cell.get() {
            return Arc::clone(cached);
        }
        if !self.active.insert((at, id)) {
            return Arc::from("");
        }
        // Element nesting follows the recorded DOM depth.
        let rendered = stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.build(at, id));
        self.active.remove(&(at, id));
        // A concurrent render may have filled the cell first; both values are identical.
        let _ = cell.set(Arc::clone(&rendered));
        rendered
    }

    fn build(&mut self, at: usize, id: NodeId) -> Arc<str> {
        let history = self.history;
        let Some(node) = history[at].html.node(id) else {
            return Arc::from("");
        };
        match node {
            Node::Text(text) => Arc::from(escape_text(text)),
            Node::Ref { delta, index } => {
                let target = at as i64 - *delta;
                if target < 0 || target > at as i64 {
                    return Arc::from("");
                }
                let target = target as usize;
                let flat = history[target].html.flattened();
                if *index < 0 || *index as usize >= flat.len() {
                    return Arc::from("");
                }
                self.visit(target, flat[*index as usize])
            }
            Node::Element {
                tag,
                attrs,
                children,
            } => {
                let mut out = String::new();
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    out.push_str(&self.visit(at, *child));
                }
                if !is_void_element(tag) {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
                Arc::from(out)
            }
            Node::Invalid => Arc::from(""),
        }
    }
}
