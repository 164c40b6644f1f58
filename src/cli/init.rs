// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

//! Init command - write the reference pipeline and dataset

use colored::Colorize;
use miette::Result;
use std::path::Path;

use crate::dataset::BUILTIN_DATASET;
use crate::pipeline::BUILTIN_PIPELINE;
use crate::utils::print_success;

const PIPELINE_FILE: &str = "kgpipe.yaml";
const DATASET_FILE: &str = "dengue.yaml";
const STATE_DIR: &str = ".kgpipe";

/// The built-in pipeline, pointed at the dataset file written next to it
fn pipeline_template() -> String {
    BUILTIN_PIPELINE.replacen(
        &format!("# dataset: {}", DATASET_FILE),
        &format!("dataset: {}", DATASET_FILE),
        1,
    )
}

/// Write the project files into `dir`
pub fn write_project(dir: &Path, force: bool) -> Result<Vec<String>> {
    let files = [
        (PIPELINE_FILE, pipeline_template()),
        (DATASET_FILE, BUILTIN_DATASET.to_string()),
    ];

    if !force {
        if let Some((existing, _)) = files.iter().find(|(name, _)| dir.join(name).exists()) {
            return Err(miette::miette!(
                "{} already exists. Use --force to overwrite.",
                existing
            ));
        }
    }

    let mut created = Vec::new();
    for (name, content) in &files {
        std::fs::write(dir.join(name), content)
            .map_err(|e| miette::miette!("Failed to write {}: {}", name, e))?;
        created.push(name.to_string());
    }

    let state = dir.join(STATE_DIR);
    if !state.exists() {
        std::fs::create_dir_all(&state)
            .map_err(|e| miette::miette!("Failed to create directory '{}': {}", STATE_DIR, e))?;
        created.push(format!("{}/", STATE_DIR));
    }

    Ok(created)
}

/// Run the init command
pub async fn run(force: bool, verbose: bool) -> Result<()> {
    println!("{}", "Initializing kgpipe project...".bold());
    println!();

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    for name in write_project(&cwd, force)? {
        print_success(&format!("Created {}", name));
    }

    println!();
    println!("{}", "Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Review {} and {}", PIPELINE_FILE.cyan(), DATASET_FILE.cyan());
    println!("  2. Run {} to check the descriptor", "kgpipe validate".cyan());
    println!("  3. Run {} to build the graph", "kgpipe run".cyan());
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", pipeline_template().dimmed());
    }

    Ok(())
}
