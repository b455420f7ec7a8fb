use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;
use tracing::info;

use super::inspect::open_model;
use crate::Config;

#[derive(Args, Clone)]
pub struct RenderArgs {
    /// Trace directory path or file: URL
    pub trace: String,

    /// Frame (or page) id the snapshot belongs to
    #[arg(long)]
    pub frame: String,

    /// Snapshot name, e.g. `before@call@12`
    #[arg(long, conflicts_with = "index")]
    pub name: Option<String>,

    /// Snapshot position within the frame
    #[arg(long)]
    pub index: Option<usize>,

    /// Write the HTML here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

pub async fn cmd_render(args: RenderArgs, config: &Config) -> Result<()> {
    let model = open_model(&args.trace, config).await?;
    let renderer = match (&args.name, args.index) {
        (Some(name), _) => model.store.by_name(&args.frame, name),
        (None, Some(index)) => model.store.by_index(&args.frame, index),
        (None, None) => {
            let count = model.store.snapshot_count(&args.frame);
            model.store.by_index(&args.frame, count.saturating_sub(1))
        }
    }
    .with_context(|| format!("no such snapshot in frame {}", args.frame))?;

    let rendered = renderer.render();
    match &args.out {
        Some(path) => {
            fs::write(path, rendered.html.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                frame = %rendered.frame_id,
                index = rendered.index,
                "Rendered snapshot written to {}",
                path.display()
            );
        }
        None => println!("{}", rendered.html),
    }
    Ok(())
}
