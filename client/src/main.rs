//! `vidsum` entry-point: loads settings, wires adapters, runs one command.

use std::io;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use client::cli::{App, Cli};
use client::config::ClientSettings;

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let config = ClientSettings::load_ambient()?.resolve()?;
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(async {
        let app = App::from_config(&config)?;
        let mut stdout = io::stdout().lock();
        app.execute(cli.command, &mut stdout).await
    })
}
