//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async functions in the chat client MUST NOT use blocking I/O.
//! **Required**: `tokio::io`, `tokio::fs`, `reqwest` async clients.
//!
//! Blocking calls are acceptable in non-async functions (configuration and
//! client-local storage are small synchronous files) and in test code.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, enclosing_fn, is_test_code, rust_sources, workspace_path, FnKind,
    PRODUCTION_SOURCE_DIRS,
};

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n❌ FORBIDDEN in async fn:");
        eprintln!("  - std::fs::*, std::net::*");
        eprintln!("  - std::process::Command");
        eprintln!("  - std::io::stdin(), std::io::stdout()");
        eprintln!("  - reqwest::blocking::*");
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::io::stdin()/stdout() with AsyncBufReadExt/AsyncWriteExt");
        eprintln!("  - reqwest::Client");
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// `reqwest::blocking` is never acceptable, not even in sync helpers
#[test]
fn test_no_blocking_http_client_anywhere() {
    let mut offenders = Vec::new();
    for dir in PRODUCTION_SOURCE_DIRS {
        for file in rust_sources(&workspace_path(dir)) {
            let content = fs::read_to_string(&file).unwrap_or_default();
            if content.lines().any(|l| code_part(l).contains("reqwest::blocking")) {
                offenders.push(file.display().to_string());
            }
        }
    }
    assert!(offenders.is_empty(), "reqwest::blocking used in {offenders:?}");
}

fn find_blocking_io_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_SOURCE_DIRS {
        for file in rust_sources(&workspace_path(dir)) {
            check_file(&file, &mut violations);
        }
    }
    violations
}

const BLOCKING_PATTERNS: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("use std::fs", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("use std::net", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
];

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        let Some((_, description)) = BLOCKING_PATTERNS.iter().find(|(p, _)| code.contains(p))
        else {
            continue;
        };

        if is_test_code(&lines, idx) {
            continue;
        }

        // Module-level imports make the blocking API reachable from async fns
        let in_async = match enclosing_fn(&lines, idx) {
            Some((_, kind)) => kind == FnKind::Async,
            None => code.trim_start().starts_with("use "),
        };

        if in_async {
            violations.push(format!(
                "{}:{} - {description}: {}",
                path.display(),
                idx + 1,
                line.trim()
            ));
        }
    }
}

#[test]
fn test_detector_flags_async_fs() {
    let dir = std::env::temp_dir().join(format!("blocking-io-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("bad.rs");
    fs::write(
        &file,
        "pub async fn load() {\n    let s = std::fs::read_to_string(\"x\");\n}\n\nfn ok() {\n    let s = std::fs::read_to_string(\"x\");\n}\n",
    )
    .unwrap();

    let mut violations = Vec::new();
    check_file(&file, &mut violations);
    fs::remove_dir_all(&dir).unwrap();

    assert_eq!(violations.len(), 1, "{violations:?}");
    assert!(violations[0].contains(":2 - Blocking file I/O"));
}
