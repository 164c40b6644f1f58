// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kgpipe contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn kgpipe(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kgpipe").unwrap();
    cmd.current_dir(dir)
        .env_remove("GRAPH_STORE_URI")
        .env_remove("GRAPH_STORE_USER")
        .env_remove("GRAPH_STORE_PASSWORD")
        .env_remove("GRAPH_STORE_AUTH")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "kgpipe=warn");
    cmd
}

fn initialized() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    kgpipe(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created kgpipe.yaml"));
    dir
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = initialized();
    assert!(dir.path().join("dengue.yaml").exists());
    assert!(dir.path().join(".kgpipe").is_dir());

    kgpipe(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    kgpipe(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_validate_reference_pipeline() {
    let dir = initialized();
    kgpipe(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn test_run_against_snapshot_store_twice() {
    let dir = initialized();

    for _ in 0..2 {
        kgpipe(dir.path())
            .args(["run", "--connect-wait", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Pipeline completed successfully."));
    }

    assert!(dir.path().join(".kgpipe/graph.json").exists());
    assert!(dir.path().join("validation_results.json").exists());
}

#[test]
fn test_run_with_store_override_and_dry_run() {
    let dir = initialized();

    kgpipe(dir.path())
        .args(["run", "--store-uri", "memory://"])
        .assert()
        .success();

    kgpipe(dir.path())
        .args(["run", "--dry-run"])
        .env("GRAPH_STORE_URI", "memory://")
        .assert()
        .success()
        .stdout(predicate::str::contains("round 1: schema"));
}

#[test]
fn test_run_unsupported_store_fails() {
    let dir = initialized();
    kgpipe(dir.path())
        .args(["run", "--store-uri", "bolt://localhost:7687"])
        .assert()
        .failure();
}

#[test]
fn test_run_without_pipeline_suggests_init() {
    let dir = tempfile::tempdir().unwrap();
    kgpipe(dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("kgpipe init"));
}

#[test]
fn test_graph_formats() {
    let dir = initialized();

    kgpipe(dir.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema"));

    kgpipe(dir.path())
        .args(["graph", "--format", "svg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("svg"));

    kgpipe(dir.path())
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"))
        .stdout(predicate::str::contains("base_entities --> symptom_links"));

    kgpipe(dir.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"schema\" -> \"base-entities\""));
}
