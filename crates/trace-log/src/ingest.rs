use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use traceview_snapshot_store::SnapshotStore;

use crate::errors::{LogError, LogResult};
use crate::migrate::{check_version, migrate, CURRENT_VERSION};
use crate::model::{ActionEvent, EventRecord, IngestStats, TraceContext, TraceEvent};

const CREATE_METHOD: &str = "__create__";

/// Fully ingested trace: the context aggregate and the snapshot store that
/// backs rendering and resource lookups.
pub struct TraceModel {
    pub context: TraceContext,
    pub store: Arc<SnapshotStore>,
    pub stats: IngestStats,
}

/// Folds the lines of one or more logs into a [`TraceModel`].
pub struct TraceModelBuilder {
    context: TraceContext,
    store: Arc<SnapshotStore>,
    stats: IngestStats,
    /// `None` until the first record of the current log has been read.
    declared: Option<Option<u32>>,
}

impl Default for TraceModelBuilder {
    fn default() -> Self {
        Self::new(Arc::new(SnapshotStore::new()))
    }
}

impl TraceModelBuilder {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self {
            context: TraceContext::default(),
            store,
            stats: IngestStats::default(),
            declared: None,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Starts a new log file; its first record declares the schema version.
    pub fn begin_log(&mut self) {
        self.declared = None;
    }

    /// Schema version the current log is migrated from.
    pub fn source_version(&self) -> Option<u32> {
        self.declared.flatten()
    }

    /// Ingests every line of `text`, skipping malformed records.
    pub fn ingest_text(&mut self, text: &str) -> LogResult<()> {
        for (lineno, line) in text.lines().enumerate() {
            match self.ingest(line) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(line = lineno + 1, error = %err, "skipping malformed trace record");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub fn ingest(&mut self, line: &str) -> LogResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.stats.lines += 1;
        let record = parse_record(line).map_err(|err| self.malformed(err))?;

        if self.declared.is_none() {
            let version = record
                .get("version")
                .and_then(Value::as_u64)
                .map(|v| u32::try_from(v).unwrap_or(u32::MAX));
            if let Some(version) = version {
                check_version(version)?;
                self.context.version.get_or_insert(version);
            }
            self.declared = Some(version);
        }

        let record = match self.source_version() {
            Some(from) if from < CURRENT_VERSION => {
                migrate(record, from, &self.context.options)?
            }
            _ => record,
        };
        let event = decode_event(record).map_err(|err| self.malformed(err))?;
        self.apply(event)
    }

    fn malformed(&mut self, err: serde_json::Error) -> LogError {
        self.stats.malformed += 1;
        LogError::from(err)
    }

    fn apply(&mut self, event: TraceEvent) -> LogResult<()> {
        debug!(kind = event.kind(), "ingesting trace record");
        match event {
            TraceEvent::ContextOptions(options) => {
                self.context.browser_name = options.browser_name;
                self.context.options = options.options;
            }
            TraceEvent::ScreencastFrame(frame) => {
                self.context
                    .page_mut(&frame.page_id)
                    .screencast_frames
                    .push(frame);
            }
            TraceEvent::Action(action) => self.apply_action(action),
            TraceEvent::Event(event) => self.apply_event(event),
            TraceEvent::ResourceSnapshot { snapshot } => {
                self.store.add_resource(snapshot);
                self.stats.resources += 1;
            }
            TraceEvent::FrameSnapshot { snapshot } => {
                self.store
                    .add_frame_snapshot(snapshot)
                    .map_err(|err| LogError::Internal(err.to_string()))?;
                self.stats.frame_snapshots += 1;
            }
        }
        Ok(())
    }

    fn apply_action(&mut self, action: ActionEvent) {
        self.context.widen(&action.metadata);
        match (action.has_snapshot, action.metadata.page_id.clone()) {
            (true, Some(page_id)) => self.context.page_mut(&page_id).actions.push(action),
            _ => {
                debug!(id = %action.metadata.id, "dropping action without snapshot");
                self.stats.dropped_actions += 1;
            }
        }
    }

    fn apply_event(&mut self, event: EventRecord) {
        self.context.widen(&event.metadata);
        let Some(page_id) = event.metadata.page_id.clone() else {
            self.stats.dropped_events += 1;
            return;
        };
        let page = self.context.page_mut(&page_id);
        if event.metadata.method == CREATE_METHOD {
            let params = &event.metadata.params;
            let guid = params.get("guid").and_then(Value::as_str);
            let initializer = params.get("initializer").cloned().unwrap_or(Value::Null);
            if let Some(guid) = guid {
                page.objects.insert(guid.to_string(), initializer);
            }
            return;
        }
        page.events.push(event);
    }

    /// Sorts actions by start time and snapshots the resource log.
    pub fn finalize(mut self) -> TraceModel {
        for page in &mut self.context.pages {
            page.actions
                .sort_by(|a, b| a.metadata.start_time.total_cmp(&b.metadata.start_time));
        }
        self.context.resources = self.store.resources();
        TraceModel {
            context: self.context,
            store: self.store,
            stats: self.stats,
        }
    }

    pub fn set_has_source(&mut self, has_source: bool) {
        self.context.has_source = has_source;
    }
}

/// Snapshot DOMs nest arbitrarily deep, so records are parsed without
/// serde_json's depth limit and the stack grows on demand instead.
fn parse_record(line: &str) -> Result<Value, serde_json::Error> {
    let mut de = serde_json::Deserializer::from_str(line);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

fn decode_event(record: Value) -> Result<TraceEvent, serde_json::Error> {
    TraceEvent::deserialize(serde_stacker::Deserializer::new(record))
}
