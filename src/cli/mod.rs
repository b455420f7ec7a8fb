mod app;
mod commands;
mod dispatch;
mod env;
mod inspect;
mod output;
mod render;
mod runtime;
mod serve;

pub use app::run;
pub use commands::Commands;
pub use env::CliArgs;
pub use inspect::{cmd_inspect, summarize, InspectArgs, TraceSummary};
pub use output::OutputFormat;
pub use render::{cmd_render, RenderArgs};
pub use runtime::{init_logging, load_config, LoadedConfig};
pub use serve::{build_state, cmd_serve, ServeArgs};
