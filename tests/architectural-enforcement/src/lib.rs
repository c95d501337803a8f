//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code
//! - No blocking I/O inside async functions
//! - The chat core stays free of surface dependencies
//!
//! The helpers here locate production sources and classify the function a
//! line belongs to. They work on plain text, not a parsed syntax tree.

use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_SOURCE_DIRS: &[&str] = &["client/core/src", "client/cli/src"];

/// Kind of function enclosing a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FnKind {
    /// `fn` (including `pub`, `pub(crate)`, `const`, `unsafe` variants)
    Sync,
    /// `async fn`
    Async,
}

/// Absolute path of `relative` inside the workspace
#[must_use]
pub fn workspace_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

/// Every `.rs` file under `dir`
#[must_use]
pub fn rust_sources(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Classify a line as a function signature, if it is one
#[must_use]
pub fn fn_signature(line: &str) -> Option<FnKind> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }
    for prefix in ["const ", "unsafe "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }

    if rest.starts_with("async fn ") {
        Some(FnKind::Async)
    } else if rest.starts_with("fn ") {
        Some(FnKind::Sync)
    } else {
        None
    }
}

/// Whether a line opens a module or impl block
fn is_block_boundary(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("mod ")
        || line.starts_with("pub mod ")
        || (line.starts_with("impl") && line.contains('{'))
}

/// The nearest function signature above `current_idx`
///
/// Returns `None` when a module or impl boundary is reached first.
#[must_use]
pub fn enclosing_fn(lines: &[&str], current_idx: usize) -> Option<(usize, FnKind)> {
    for i in (0..=current_idx).rev() {
        if let Some(kind) = fn_signature(lines[i]) {
            return Some((i, kind));
        }
        if i != current_idx && is_block_boundary(lines[i]) {
            return None;
        }
    }
    None
}

/// Whether the line sits in a `#[test]`/`#[tokio::test]` function or a
/// `#[cfg(test)]` module
#[must_use]
pub fn is_test_code(lines: &[&str], current_idx: usize) -> bool {
    if lines[..current_idx]
        .iter()
        .any(|l| l.trim().starts_with("#[cfg(test)]"))
    {
        return true;
    }

    let Some((fn_idx, _)) = enclosing_fn(lines, current_idx) else {
        return false;
    };
    for line in lines[..fn_idx].iter().rev() {
        let line = line.trim();
        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }
        if !line.starts_with("#[") && !line.starts_with("///") {
            break;
        }
    }
    false
}

/// The code part of a line, without a trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_variants() {
        assert_eq!(fn_signature("fn main() {"), Some(FnKind::Sync));
        assert_eq!(fn_signature("    pub fn load(&self) {"), Some(FnKind::Sync));
        assert_eq!(
            fn_signature("pub(crate) fn helper() -> u8 {"),
            Some(FnKind::Sync)
        );
        assert_eq!(
            fn_signature("    pub async fn submit(&mut self) {"),
            Some(FnKind::Async)
        );
        assert_eq!(fn_signature("async fn run() {"), Some(FnKind::Async));
        assert_eq!(fn_signature("let f = fn_ptr;"), None);
    }

    #[test]
    fn test_enclosing_fn_stops_at_impl() {
        let code = vec![
            "impl Store {",
            "    const LIMIT: usize = 3;",
            "}",
            "impl Other {",
            "    let x = std::fs::read(\"f\");",
        ];
        assert_eq!(enclosing_fn(&code, 4), None);
    }

    #[test]
    fn test_async_detection() {
        let code = vec![
            "pub async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert_eq!(enclosing_fn(&code, 1), Some((0, FnKind::Async)));
    }

    #[test]
    fn test_test_function_detection() {
        let code = vec![
            "#[tokio::test]",
            "async fn test_something() {",
            "    tokio::time::sleep(Duration::from_millis(5)).await;",
            "}",
        ];
        assert!(is_test_code(&code, 2));

        let production = vec![
            "/// Does work",
            "async fn work() {",
            "    tokio::time::sleep(Duration::from_millis(5)).await;",
            "}",
        ];
        assert!(!is_test_code(&production, 2));
    }

    #[test]
    fn test_cfg_test_module_detection() {
        let code = vec![
            "fn prod() {}",
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() {",
            "        std::fs::write(\"x\", \"y\").unwrap();",
            "    }",
            "}",
        ];
        assert!(!is_test_code(&code, 0));
        assert!(is_test_code(&code, 4));
    }

    #[test]
    fn test_workspace_paths_exist() {
        for dir in PRODUCTION_SOURCE_DIRS {
            assert!(workspace_path(dir).exists(), "missing {dir}");
        }
    }
}
