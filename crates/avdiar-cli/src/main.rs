//! avdiar binary entry point
//!
//! Parses the CLI, resolves configuration and credentials once, then hands
//! control to the pipeline with a cancellation token wired to ctrl-c.

mod cli;
mod config;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::PipelineConfig;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Logs go to stderr; stdout stays clean for pipeline summaries.
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = PipelineConfig::from_cli(args)?;
    tracing::info!("processing {:?}", config.media);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current stage");
            signal_token.cancel();
        }
    });

    pipeline::run(&config, &cancel).await
}
