// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! # kgpipe - Knowledge Graph Build Pipeline
//!
//! `kgpipe` loads a curated dataset into a property graph in
//! dependency-ordered stages and validates the result.
//!
//! ## Features
//!
//! - **Idempotent writes** - Every stage upserts on natural keys, so re-runs converge
//! - **Pipeline orchestration** - Stages run in dependency order, independent ones in parallel
//! - **Structural validation** - Coverage, count and liveness checks with a JSON report
//! - **Pluggable stores** - In-process and JSON snapshot stores behind one session contract
//!
//! ## Quick Start
//!
//! ```bash
//! # Write the reference dengue pipeline
//! kgpipe init
//!
//! # Check the descriptor
//! kgpipe validate
//!
//! # Build and validate the graph
//! kgpipe run
//! ```

pub mod cli;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod executors;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod utils;
pub mod validator;

// Re-export commonly used types
pub use dataset::Dataset;
pub use errors::{KgError, KgResult};
pub use pipeline::{Pipeline, PipelineExecutor, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
