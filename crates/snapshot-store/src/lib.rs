//! Frame snapshot storage for trace replay.
//!
//! Snapshots arrive per frame in capture order and are stored in a compact,
//! delta-encoded form. [`SnapshotRenderer`] turns one of them back into HTML
//! and answers which recorded resource it referenced for a given URL.

pub mod errors;
pub mod metrics;
pub mod model;
pub mod node;
pub mod render;
pub mod resolve;
pub mod store;

pub use errors::{SnapErrKind, SnapError, SnapResult};
pub use metrics::SnapMetricsSnapshot;
pub use model::{
    FrameSnapshot, Header, RenderedFrameSnapshot, ResourceOverride, ResourceSnapshot,
    SnapshotAdded, Viewport,
};
pub use render::SnapshotRenderer;
pub use store::SnapshotStore;
