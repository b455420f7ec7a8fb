//! Trace log ingestion.
//!
//! Raw newline-delimited records are migrated to the current schema and
//! folded into a [`TraceContext`] plus a snapshot store.

pub mod errors;
pub mod ingest;
pub mod migrate;
pub mod model;

pub use errors::{LogError, LogResult};
pub use ingest::{TraceModel, TraceModelBuilder};
pub use migrate::{migrate, CURRENT_VERSION};
pub use model::{
    ActionEvent, CallMetadata, ContextOptions, EventRecord, IngestStats, PageEntry,
    ScreencastFrame, TraceContext, TraceEvent,
};
