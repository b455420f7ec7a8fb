use clap::Subcommand;

use super::inspect::InspectArgs;
use super::render::RenderArgs;
use super::serve::ServeArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Serve recorded traces over HTTP
    Serve(ServeArgs),

    /// Load a trace and summarize its contents
    Inspect(InspectArgs),

    /// Render one frame snapshot of a trace to HTML
    Render(RenderArgs),
}
