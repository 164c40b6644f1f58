// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{DagBuilder, Pipeline, PipelineValidator};
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Run 'kgpipe init' to create one.",
            pipeline_path.display()
        ));
    }

    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            print_error("Failed to parse pipeline");
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };
    print_success("Pipeline file is valid YAML");

    let base_dir = pipeline_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let dataset = match pipeline.load_dataset(base_dir) {
        Ok(d) => {
            print_success(&format!(
                "Dataset loaded ({} entities, {} relationships)",
                d.entities.len(),
                d.relationships.len()
            ));
            Some(d)
        }
        Err(e) => {
            print_error(&format!("Dataset could not be loaded: {}", e));
            None
        }
    };

    let validation = PipelineValidator::validate(&pipeline, dataset.as_ref())?;

    if !validation.errors.is_empty() {
        print_section(&"Errors".red().bold().to_string());
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        print_section(&"Warnings".yellow().bold().to_string());
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose && validation.is_valid() {
        print_section("Pipeline summary");
        println!("  Name: {}", pipeline.name);
        println!(
            "  Stages: {} ({})",
            pipeline.stages.len(),
            pipeline.stage_names().join(", ")
        );
        let dag = DagBuilder::build(&pipeline)?;
        for idx in dag.topological_order()? {
            let stage = &pipeline.stages[idx];
            let deps = if stage.depends_on.is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", stage.depends_on.join(", "))
            };
            println!("    - {} ({}){}", stage.name, stage.action_name(), deps.dimmed());
        }
    }

    println!();

    if !validation.is_valid() || dataset.is_none() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
