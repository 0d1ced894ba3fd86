//! CI helper that scans the workspace for `#[deprecated(..)]` attributes and
//! rejects any that omit a removal/migration window, the zero-dependency
//! string-scan tool used in this pack's CI (the same policy spark-core's own
//! lint enforces over its own deprecations).
//!
//! The check is intentionally a line scan rather than an AST walk: it cannot
//! see deprecations produced by macro expansion, but that keeps this crate
//! dependency-free so it runs in any CI sandbox without a syn/rustc toolchain.

use std::{
    env,
    ffi::OsStr,
    fs, io,
    path::{Path, PathBuf},
};

fn main() {
    if let Err(error) = run() {
        match error {
            ToolError::Io(io_error) => {
                eprintln!("fleetctl-deprecation-lint: failed to read a file: {io_error}");
                std::process::exit(1);
            }
            ToolError::Policy(findings) => {
                eprintln!("fleetctl-deprecation-lint: found deprecation annotations missing required fields:");
                for finding in &findings {
                    eprintln!("  - {}", finding.format());
                }
                std::process::exit(1);
            }
        }
    }
}

fn run() -> Result<(), ToolError> {
    let workspace_root = workspace_root();
    let mut files = Vec::new();
    collect_rust_files(&workspace_root, &mut files)?;

    let mut findings = Vec::new();
    for path in files {
        findings.extend(inspect_file(&workspace_root, &path)?);
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Policy(findings))
    }
}

/// `CARGO_MANIFEST_DIR` points at `crates/fleetctl-deprecation-lint`; two
/// ancestors up is the workspace root.
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("crate is expected to live at <root>/crates/fleetctl-deprecation-lint")
        .to_path_buf()
}

fn collect_rust_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<(), ToolError> {
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(ToolError::Io)?;
        for entry in entries {
            let entry = entry.map_err(ToolError::Io)?;
            let entry_path = entry.path();
            if entry.file_type().map_err(ToolError::Io)?.is_dir() {
                if should_skip_dir(&entry_path) {
                    continue;
                }
                stack.push(entry_path);
            } else if entry_path
                .extension()
                .and_then(OsStr::to_str)
                .map(|ext| ext.eq_ignore_ascii_case("rs"))
                .unwrap_or(false)
            {
                files.push(entry_path);
            }
        }
    }
    Ok(())
}

fn should_skip_dir(path: &Path) -> bool {
    path.components().any(|component| {
        matches!(component.as_os_str().to_str(), Some("target" | ".git" | "examples"))
    })
}

fn inspect_file(workspace_root: &Path, path: &Path) -> Result<Vec<Finding>, ToolError> {
    let content = fs::read_to_string(path).map_err(ToolError::Io)?;
    let mut findings = Vec::new();

    let mut lines = content.lines().enumerate();
    while let Some((line_index, line)) = lines.next() {
        if let Some(start) = line.find("#[deprecated") {
            if !line.trim_start().starts_with("#[deprecated") {
                continue;
            }
            let mut attribute = String::from(&line[start..]);
            let mut end_line = line_index;
            while !attribute.contains(']') {
                if let Some((next_index, next_line)) = lines.next() {
                    attribute.push('\n');
                    attribute.push_str(next_line);
                    end_line = next_index;
                } else {
                    break;
                }
            }

            if let Some(messages) = validate_attribute(&attribute) {
                let relative = path.strip_prefix(workspace_root).unwrap_or(path).to_path_buf();
                for message in messages {
                    findings.push(Finding { path: relative.clone(), line: line_index + 1, message, span_end: end_line + 1 });
                }
            }
        }
    }

    Ok(findings)
}

/// Required note format: `note = "removal: <version>; migration: <hint>"`.
fn validate_attribute(attribute: &str) -> Option<Vec<String>> {
    let mut messages = Vec::new();
    if !attribute.contains("since") {
        messages.push("missing `since` field".to_string());
    }
    if !attribute.contains("note") {
        messages.push("missing `note` field".to_string());
    }
    if attribute.contains("\"\"") {
        messages.push("`note` field is empty".to_string());
    }
    if attribute.contains("TBD") {
        messages.push("`note` field must not use a TBD placeholder".to_string());
    }
    if !attribute.contains("removal:") {
        messages.push("`note` field must contain a `removal:` marker".to_string());
    }
    if !attribute.contains("migration:") {
        messages.push("`note` field must contain a `migration:` marker".to_string());
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages)
    }
}

#[derive(Debug)]
struct Finding {
    path: PathBuf,
    line: usize,
    span_end: usize,
    message: String,
}

impl Finding {
    fn format(&self) -> String {
        format!("{}:{}-{} {}", self.path.display(), self.line, self.span_end, self.message)
    }
}

#[derive(Debug)]
enum ToolError {
    Io(io::Error),
    Policy(Vec<Finding>),
}

impl From<io::Error> for ToolError {
    fn from(error: io::Error) -> Self {
        ToolError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_fully_annotated_attribute() {
        let attribute = r#"#[deprecated(since = "0.3.0", note = "removal: 0.5.0; migration: use ConfigHash::compute")]"#;
        assert!(validate_attribute(attribute).is_none());
    }

    #[test]
    fn rejects_missing_migration_marker() {
        let attribute = r#"#[deprecated(since = "0.3.0", note = "removal: 0.5.0")]"#;
        let messages = validate_attribute(attribute).expect("should flag missing migration marker");
        assert!(messages.iter().any(|m| m.contains("migration:")));
    }

    #[test]
    fn rejects_tbd_placeholder() {
        let attribute = r#"#[deprecated(since = "0.3.0", note = "removal: TBD; migration: TBD")]"#;
        let messages = validate_attribute(attribute).expect("should flag TBD placeholder");
        assert!(messages.iter().any(|m| m.contains("TBD")));
    }
}
