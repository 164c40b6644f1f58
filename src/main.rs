// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! kgpipe - Knowledge Graph Build Pipeline
//!
//! Load a curated dataset into a graph store and validate the result.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kgpipe::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "kgpipe=debug" } else { "kgpipe=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { force } => kgpipe::cli::init::run(force, cli.verbose).await,
        Commands::Run {
            pipeline,
            stage,
            dry_run,
            log_dir,
            max_parallel,
            store,
        } => {
            kgpipe::cli::run::run(
                pipeline,
                stage,
                dry_run,
                log_dir,
                max_parallel,
                store,
                cli.verbose,
            )
            .await
        }
        Commands::Validate { pipeline } => kgpipe::cli::validate::run(pipeline, cli.verbose).await,
        Commands::Graph { pipeline, format } => {
            kgpipe::cli::graph::run(pipeline, format, cli.verbose).await
        }
    }
}
