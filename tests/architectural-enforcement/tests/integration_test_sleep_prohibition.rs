//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the chat client MUST NOT call sleep methods.
//! Waiting happens on I/O (the event stream, stdin), never on timers. The
//! client never retries on a timer either: the only retry is the immediate
//! single-shot fallback.
//! **Exceptions**: test code, `tokio::time::interval` ticks

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, is_test_code, rust_sources, workspace_path, PRODUCTION_SOURCE_DIRS,
};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = find_sleep_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");

        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }

        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Test code (#[test] or #[tokio::test] functions)");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - Sleep to 'wait' for stream events (await the stream!)");
        eprintln!("  - Sleep-based retry or backoff loops");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

fn find_sleep_violations() -> Vec<String> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_SOURCE_DIRS {
        for file in rust_sources(&workspace_path(dir)) {
            check_file(&file, &mut violations);
        }
    }
    violations
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }

        if is_test_code(&lines, idx) {
            continue;
        }
        if is_interval_pattern(&lines, idx) {
            continue;
        }

        violations.push(format!("{}:{} - {}", path.display(), idx + 1, line.trim()));
    }
}

/// Check if this is a tokio::time::interval pattern (acceptable for periodic tasks)
fn is_interval_pattern(lines: &[&str], current_idx: usize) -> bool {
    let before = &lines[current_idx.saturating_sub(20)..current_idx];
    let after = &lines[current_idx..(current_idx + 5).min(lines.len())];

    before
        .iter()
        .any(|l| l.contains("interval.tick()") || l.contains("tokio::time::interval"))
        || after.iter().any(|l| l.contains("interval.tick()"))
}

#[test]
fn test_backoff_sleep_is_flagged() {
    let dir = std::env::temp_dir().join(format!("sleep-backoff-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("retry.rs");
    fs::write(
        &file,
        "async fn reconnect(attempt: u32) {\n    let delay = 100 * (1 << attempt);\n    tracing::warn!(attempt, \"Retrying\");\n    tokio::time::sleep(Duration::from_millis(delay)).await;\n}\n",
    )
    .unwrap();

    let mut violations = Vec::new();
    check_file(&file, &mut violations);
    fs::remove_dir_all(&dir).unwrap();

    assert_eq!(violations.len(), 1, "{violations:?}");
    assert!(violations[0].contains(":4 - tokio::time::sleep"));
}

#[test]
fn test_polling_sleep_is_not_exempt() {
    let code = vec![
        "async fn wait_for_reply() {",
        "    loop {",
        "        tokio::time::sleep(Duration::from_millis(50)).await;",
        "    }",
        "}",
    ];
    assert!(!is_interval_pattern(&code, 2));
    assert!(!is_test_code(&code, 2));
}
