use anyhow::Result;

use super::commands::Commands;
use super::env::CliArgs;
use super::inspect::cmd_inspect;
use super::render::cmd_render;
use super::serve::cmd_serve;
use crate::Config;

pub async fn dispatch(cli: &CliArgs, config: Config) -> Result<()> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, config).await,
        Commands::Inspect(args) => cmd_inspect(args, &config).await,
        Commands::Render(args) => cmd_render(args, &config).await,
    }
}
