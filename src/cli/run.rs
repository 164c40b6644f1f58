// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use tracing::warn;

use super::StoreArgs;
use crate::errors::RecoverySuggestion;
use crate::pipeline::{
    ExecutionOptions, PipelineExecutor, PipelineResult, PipelineValidator, StageStatus,
};
use crate::store::connector_for;
use crate::utils::{create_spinner, print_error, print_header, print_info, print_section, print_warning, status_mark};

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    stages: Vec<String>,
    dry_run: bool,
    log_dir: Option<PathBuf>,
    max_parallel: Option<usize>,
    store: StoreArgs,
    verbose: bool,
) -> Result<()> {
    let (mut pipeline, dataset) = super::load(&pipeline_path)?;
    pipeline.store.apply(store.into());

    // Validate pipeline
    let validation = PipelineValidator::validate(&pipeline, Some(&dataset))?;

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            print_error(error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            print_warning(warning);
        }
        eprintln!();
    }

    if pipeline.store.missing_credentials() {
        warn!(
            user = pipeline.store.user.as_deref().unwrap_or_default(),
            "No password given; set GRAPH_STORE_PASSWORD or GRAPH_STORE_AUTH=none"
        );
    }

    let connector = connector_for(&pipeline.store)?;
    let working_dir = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;

    let options = ExecutionOptions {
        dry_run,
        stages,
        log_dir,
        max_parallel,
        working_dir,
    };

    print_header(&format!("Pipeline: {}", pipeline.name));
    if let Some(ref description) = pipeline.description {
        println!("{}", description.dimmed());
    }

    let spinner = (!dry_run).then(|| create_spinner(&format!("Running against {}", connector.uri())));
    let executor = PipelineExecutor::default();
    let outcome = executor
        .execute(&pipeline, &dataset, connector.as_ref(), &options)
        .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            if let Some(suggestion) = RecoverySuggestion::for_error(&e) {
                eprintln!();
                eprint!("{}", suggestion);
            }
            return Err(e.into());
        }
    };

    if result.dry_run {
        print_plan(&result);
        return Ok(());
    }

    print_stages(&result, verbose);

    print_section("Run");
    print_info(&format!("id: {}", result.run_id));
    print_info(&format!("dataset: {}", &result.dataset_digest[..result.dataset_digest.len().min(16)]));
    print_info(&format!("elapsed: {:.2}s", result.duration.as_secs_f64()));

    if result.success {
        println!();
        println!("{}", "Pipeline completed successfully.".green().bold());
        return Ok(());
    }

    print_problems(&result);

    match result.first_failure() {
        Some(first) => Err(miette::miette!("Pipeline failed at stage '{}'", first.name)),
        None => Err(miette::miette!("Pipeline execution failed")),
    }
}

fn print_plan(result: &PipelineResult) {
    print_section("Execution plan (dry run)");
    for (round, names) in result.plan.iter().enumerate() {
        println!("  round {}: {}", round + 1, names.join(", "));
    }
}

fn print_stages(result: &PipelineResult, verbose: bool) {
    print_section("Stages");
    for stage in &result.stages {
        let detail = match &stage.status {
            StageStatus::Succeeded(summary) => summary.message.clone(),
            StageStatus::Failed(failure) => format!("{}: {}", failure.kind, failure.error),
            StageStatus::Skipped { blocked_by } => format!("skipped, blocked by {}", blocked_by),
        };
        println!(
            "  {} {} {} {}",
            status_mark(&stage.status),
            stage.name.bold(),
            format!("({:.2}s)", stage.duration.as_secs_f64()).dimmed(),
            detail
        );

        if verbose {
            if let Some(ref log) = stage.log {
                println!("      {}", log.display().to_string().dimmed());
            }
        }
    }
}

fn print_problems(result: &PipelineResult) {
    eprintln!();
    eprintln!("{}", "Pipeline failed:".red().bold());
    for stage in result.problems() {
        match &stage.status {
            StageStatus::Failed(failure) => {
                print_error(&format!("{} ({})", stage.name, failure.kind));
                if let Some(report) = failure.report() {
                    for violation in report.violations() {
                        eprintln!("      {}", violation.to_string().dimmed());
                    }
                }
            }
            StageStatus::Skipped { blocked_by } => {
                print_warning(&format!("{} skipped (blocked by {})", stage.name, blocked_by));
            }
            StageStatus::Succeeded(_) => {}
        }
    }

    if let Some(StageStatus::Failed(failure)) = result.first_failure().map(|s| &s.status) {
        if let Some(suggestion) = RecoverySuggestion::for_error(&failure.error) {
            eprintln!();
            eprint!("{}", suggestion);
        }
    }
}
