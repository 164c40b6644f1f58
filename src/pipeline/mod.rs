// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Pipeline definitions and orchestration
//!
//! This module defines the kgpipe.yaml descriptor, the stage dependency
//! graph, descriptor validation and the executor that runs stages.

mod dag;
mod definition;
mod executor;
mod validation;

pub use dag::DagBuilder;
pub use definition::*;
pub use executor::{
    ExecutionOptions, PipelineExecutor, PipelineResult, StageFailure, StageReport, StageStatus,
};
pub use validation::{PipelineValidator, ValidationResult};
