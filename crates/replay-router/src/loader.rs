use std::sync::Arc;

use tracing::info;

use traceview_snapshot_store::SnapshotStore;
use traceview_trace_log::{TraceModel, TraceModelBuilder};

use crate::archive::TraceArchive;
use crate::errors::{RouteError, RouteResult};

const TRACE_SUFFIX: &str = ".trace";
const NETWORK_SUFFIX: &str = ".network";
const SOURCE_MARKER: &str = "src@";

/// Folds every `<ordinal>.trace` log (and its `<ordinal>.network` companion)
/// of `archive` into one model backed by `store`.
pub async fn load_trace(
    archive: &dyn TraceArchive,
    store: Arc<SnapshotStore>,
) -> RouteResult<TraceModel> {
    let names = archive.entry_names().await?;
    let has_source = names.iter().any(|name| name.contains(SOURCE_MARKER));
    let ordinals: Vec<&str> = names
        .iter()
        .filter_map(|name| name.strip_suffix(TRACE_SUFFIX))
        .collect();
    if ordinals.is_empty() {
        return Err(RouteError::NotFound("archive has no trace log".into()));
    }

    let mut builder = TraceModelBuilder::new(store);
    for ordinal in ordinals {
        let trace_entry = format!("{ordinal}{TRACE_SUFFIX}");
        let Some(text) = archive.read_text(&trace_entry).await? else {
            return Err(RouteError::NotFound(trace_entry));
        };
        builder.begin_log();
        builder.ingest_text(&text)?;

        let network_entry = format!("{ordinal}{NETWORK_SUFFIX}");
        if let Some(network) = archive.read_text(&network_entry).await? {
            builder.ingest_text(&network)?;
        }
    }
    builder.set_has_source(has_source);

    let model = builder.finalize();
    let stats = model.stats;
    info!(
        pages = model.context.pages.len(),
        actions = model.context.action_count(),
        resources = stats.resources,
        frame_snapshots = stats.frame_snapshots,
        malformed = stats.malformed,
        "trace loaded"
    );
    Ok(model)
}

/// Content blob recorded under `resources/<sha1>`.
pub async fn resource_for_sha1(
    archive: &dyn TraceArchive,
    sha1: &str,
) -> RouteResult<Option<Vec<u8>>> {
    archive.read_bytes(&format!("resources/{sha1}")).await
}
