//! Integration Test: Surface Independence
//!
//! **Policy**: The chat core MUST NOT depend on terminal, GUI, CLI-parsing or
//! log-subscriber crates. Surfaces choose those; the core only emits
//! `ChatUpdate`s and `tracing` events.

use std::fs;

use architectural_enforcement::{code_part, rust_sources, workspace_path};

const FORBIDDEN_CORE_DEPENDENCIES: &[&str] = &[
    "clap",
    "crossterm",
    "ratatui",
    "tracing-subscriber",
    "anyhow",
];

/// Dependency names declared in the `[dependencies]` table of a manifest
fn runtime_dependencies(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();
    for line in manifest.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_dependencies = line == "[dependencies]";
            continue;
        }
        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((name, _)) = line.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[test]
fn test_core_manifest_has_no_surface_dependencies() {
    let manifest = fs::read_to_string(workspace_path("client/core/Cargo.toml"))
        .expect("core manifest should be readable");
    let dependencies = runtime_dependencies(&manifest);

    assert!(dependencies.iter().any(|d| d == "tokio"), "{dependencies:?}");

    let forbidden: Vec<_> = dependencies
        .iter()
        .filter(|d| FORBIDDEN_CORE_DEPENDENCIES.contains(&d.as_str()))
        .collect();
    assert!(
        forbidden.is_empty(),
        "chat core depends on surface crates: {forbidden:?}"
    );
}

#[test]
fn test_core_sources_do_not_print() {
    let mut offenders = Vec::new();
    for file in rust_sources(&workspace_path("client/core/src")) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            if line.trim_start().starts_with("//") {
                continue;
            }
            let code = code_part(line);
            if code.contains("println!(") || code.contains("eprintln!(") {
                offenders.push(format!("{}:{}", file.display(), idx + 1));
            }
        }
    }
    assert!(offenders.is_empty(), "core writes to the terminal: {offenders:?}");
}

#[test]
fn test_dependency_table_parsing() {
    let manifest = "[package]\nname = \"x\"\n\n[dependencies]\n# Async\ntokio = \"1\"\nserde = { version = \"1\" }\n\n[dev-dependencies]\nclap = \"4\"\n";
    assert_eq!(runtime_dependencies(manifest), vec!["tokio", "serde"]);
}
