pub mod app;
pub mod classifier;
pub mod cli;
pub mod dispatcher;
pub mod enforcer;
pub mod host;
pub mod maintenance;
pub mod models;
pub mod scheduler;
pub mod settings;
pub mod storage;
pub mod tracking;
pub mod utils;

use anyhow::Context;
use clap::Parser;

pub fn run() -> anyhow::Result<()> {
    // stdout belongs to the browser, so logs go to stderr.
    utils::logging::init();

    let cli = cli::Cli::parse();
    log::info!("breakwatch {} starting up...", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(app::run(cli))
}
