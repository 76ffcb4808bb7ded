//! SSU CLI - upscale in-situ soil moisture to raster maps with random forests.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ssu-cli",
    version,
    about = "Soil moisture upscaling toolkit"
)]
struct Cli {
    /// Log per-site skips and stop at the first failing date
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: ssu_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
    ssu_cmd::run(cli.command, cli.debug)
}
