use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use traceview_core_types::TraceId;
use traceview_replay_router::{load_trace, ArchiveOpener, FsArchiveOpener};
use traceview_snapshot_store::SnapshotStore;
use traceview_trace_log::{IngestStats, TraceModel};

use super::output::OutputFormat;
use crate::Config;

#[derive(Args, Clone)]
pub struct InspectArgs {
    /// Trace directory path or file: URL
    pub trace: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Emit the full context model instead of a summary (json/yaml only)
    #[arg(long)]
    pub full: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TraceSummary {
    pub trace: String,
    pub browser_name: String,
    pub version: Option<u32>,
    pub start_time: f64,
    pub end_time: f64,
    pub has_source: bool,
    pub pages: Vec<PageSummary>,
    pub resources: usize,
    pub frames: Vec<FrameSummary>,
    pub stats: IngestStats,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PageSummary {
    pub page_id: String,
    pub actions: usize,
    pub events: usize,
    pub screencast_frames: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FrameSummary {
    pub frame_id: String,
    pub snapshots: usize,
}

pub async fn cmd_inspect(args: InspectArgs, config: &Config) -> Result<()> {
    let model = open_model(&args.trace, config).await?;
    if args.full && args.format != OutputFormat::Human {
        return print(&model.context, args.format);
    }
    let summary = summarize(&args.trace, &model);
    match args.format {
        OutputFormat::Human => print_human(&summary),
        format => print(&summary, format)?,
    }
    Ok(())
}

pub(crate) async fn open_model(trace: &str, config: &Config) -> Result<TraceModel> {
    let opener = FsArchiveOpener::new(config.router.trace_root.clone());
    let archive = opener
        .open(&TraceId::from(trace))
        .await
        .with_context(|| format!("failed to open trace {trace}"))?;
    load_trace(archive.as_ref(), Arc::new(SnapshotStore::new()))
        .await
        .with_context(|| format!("failed to load trace {trace}"))
}

pub fn summarize(trace: &str, model: &TraceModel) -> TraceSummary {
    let context = &model.context;
    let frames = model
        .store
        .frame_ids()
        .into_iter()
        .map(|frame_id| FrameSummary {
            snapshots: model.store.snapshot_count(&frame_id),
            frame_id,
        })
        .collect();
    TraceSummary {
        trace: trace.to_string(),
        browser_name: context.browser_name.clone(),
        version: context.version,
        start_time: context.start_time,
        end_time: context.end_time,
        has_source: context.has_source,
        pages: context
            .pages
            .iter()
            .map(|page| PageSummary {
                page_id: page.page_id.to_string(),
                actions: page.actions.len(),
                events: page.events.len(),
                screencast_frames: page.screencast_frames.len(),
            })
            .collect(),
        resources: context.resources.len(),
        frames,
        stats: model.stats,
    }
}

fn print<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        _ => serde_json::to_string_pretty(value)?,
    };
    println!("{}", text);
    Ok(())
}

fn print_human(summary: &TraceSummary) {
    println!("Trace: {}", summary.trace);
    println!(
        "  browser: {}  version: {}",
        if summary.browser_name.is_empty() {
            "-"
        } else {
            &summary.browser_name
        },
        summary
            .version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if summary.start_time <= summary.end_time {
        println!(
            "  window: {:.1}ms .. {:.1}ms",
            summary.start_time, summary.end_time
        );
    }
    println!("  resources: {}", summary.resources);
    for page in &summary.pages {
        println!(
            "  page {}: {} actions, {} events, {} screencast frames",
            page.page_id, page.actions, page.events, page.screencast_frames
        );
    }
    for frame in &summary.frames {
        println!("  frame {}: {} snapshots", frame.frame_id, frame.snapshots);
    }
    let stats = &summary.stats;
    if stats.malformed > 0 || stats.dropped_actions > 0 || stats.dropped_events > 0 {
        println!(
            "  skipped: {} malformed lines, {} actions, {} events",
            stats.malformed, stats.dropped_actions, stats.dropped_events
        );
    }
}
