// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for kgpipe.

pub mod graph;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::StoreOverrides;
use crate::dataset::Dataset;
use crate::pipeline::Pipeline;

/// Knowledge graph pipeline runner
///
/// Load a curated dataset into a graph store in dependency-ordered stages.
#[derive(Parser, Debug)]
#[clap(
    name = "kgpipe",
    version,
    about = "Load a curated dataset into a graph store and validate the result",
    long_about = None,
    after_help = "Examples:\n\
        kgpipe init                        Write the reference dengue pipeline\n\
        kgpipe validate                    Check kgpipe.yaml\n\
        kgpipe run                         Execute the pipeline\n\
        kgpipe run --store-uri memory://   Execute against a throwaway store\n\
        kgpipe graph -f mermaid            Show stage dependencies\n\n\
        See 'kgpipe <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write kgpipe.yaml and the reference dataset
    Init {
        /// Overwrite existing files
        #[clap(long)]
        force: bool,
    },

    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = "kgpipe.yaml")]
        pipeline: PathBuf,

        /// Run only specific stages
        #[clap(short, long)]
        stage: Vec<String>,

        /// Dry run (show what would be done)
        #[clap(long)]
        dry_run: bool,

        /// Write per-stage logs under this directory
        #[clap(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,

        /// Maximum stages running at the same time
        #[clap(long, value_name = "N")]
        max_parallel: Option<usize>,

        #[clap(flatten)]
        store: StoreArgs,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = "kgpipe.yaml")]
        pipeline: PathBuf,
    },

    /// Show pipeline as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = "kgpipe.yaml")]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },
}

/// Store connection flags; each falls back to an environment variable
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Graph store URI
    #[clap(long, env = "GRAPH_STORE_URI", value_name = "URI")]
    pub store_uri: Option<String>,

    /// Graph store user
    #[clap(long, env = "GRAPH_STORE_USER", value_name = "USER")]
    pub store_user: Option<String>,

    /// Graph store password
    #[clap(long, env = "GRAPH_STORE_PASSWORD", hide_env_values = true, value_name = "PASSWORD")]
    pub store_password: Option<String>,

    /// Authentication mode; `none` connects without credentials
    #[clap(long, env = "GRAPH_STORE_AUTH", value_name = "MODE")]
    pub store_auth: Option<String>,

    /// Connection attempts before giving up
    #[clap(long, value_name = "N")]
    pub connect_attempts: Option<u32>,

    /// Seconds between connection attempts
    #[clap(long, value_name = "SECS")]
    pub connect_wait: Option<u64>,
}

impl From<StoreArgs> for StoreOverrides {
    fn from(args: StoreArgs) -> Self {
        Self {
            uri: args.store_uri,
            user: args.store_user,
            password: args.store_password,
            auth: args.store_auth,
            connect_attempts: args.connect_attempts,
            connect_wait_secs: args.connect_wait,
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Load a pipeline and its dataset, with a hint when the file is missing
pub(crate) fn load(pipeline_path: &Path) -> miette::Result<(Pipeline, Dataset)> {
    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Run 'kgpipe init' to create one.",
            pipeline_path.display()
        ));
    }

    let pipeline = Pipeline::from_file(pipeline_path)?;
    let base_dir = pipeline_path.parent().unwrap_or_else(|| Path::new("."));
    let dataset = pipeline.load_dataset(base_dir)?;

    Ok((pipeline, dataset))
}
