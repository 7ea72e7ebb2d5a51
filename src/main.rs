mod analysis;
mod auth;
mod cli;
mod config;
mod error;
mod mcp;
mod output;
mod travis;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Logs go to stderr; stdout belongs to the protocol
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.as_str()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    info!("Starting travis-lens {}", env!("CARGO_PKG_VERSION"));
    config.log_origin();
    cli.execute(&config).await?;

    Ok(())
}
