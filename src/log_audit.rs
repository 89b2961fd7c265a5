// Static check: scans all Rust source files for tracing calls that would
// write medicine names, operator free text or other identifying values to
// the log. Logs carry opaque ids only.

use std::fs;
use std::path::Path;

/// Field names and interpolations that must not appear in tracing macros.
const NAME_PATTERNS: &[&str] = &[
    "patient_name",
    "medicine_name",
    "trigger_medicine_name",
    "display_name",
    "medicine_display_name",
    "default_dose",
    "dosage",
    "med.name",
    "medicine.name",
    "input.name",
    "request.message",
    "administration.message",
    "name = ",
    "%name",
    "{name}",
];

/// Files allowed to mention the patterns outside tracing calls.
const ALLOWLIST: &[&str] = &["log_audit.rs"];

#[test]
fn no_names_in_tracing_calls() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    assert!(src_dir.exists(), "Source directory not found: {}", src_dir.display());

    let mut violations = Vec::new();
    scan_directory(&src_dir, &mut violations);

    if !violations.is_empty() {
        let report = violations
            .iter()
            .map(|(file, line_num, call, pattern)| {
                format!("  {file}:{line_num}: found '{pattern}' in: {call}")
            })
            .collect::<Vec<_>>()
            .join("\n");
        panic!(
            "LOG AUDIT FAILED: {} violation(s) found in tracing calls:\n{}\n\n\
             Fix: log opaque ids instead of names or free text.",
            violations.len(),
            report
        );
    }
}

#[test]
fn scanner_detects_known_violation() {
    let line = r#"tracing::info!(name = %med.name, "medicine added");"#;
    assert!(find_pattern(line).is_some(), "Scanner should flag: {line}");
}

#[test]
fn scanner_passes_clean_tracing() {
    let line = r#"tracing::info!(medicine_id = %medicine.id, "Medicine added to catalog");"#;
    assert!(find_pattern(line).is_none(), "Clean line should pass: {line}");
}

#[test]
fn multi_line_calls_are_joined() {
    let source = "tracing::warn!(\n    prescription_id = %id,\n    medicine_name = %n,\n    \"x\"\n);";
    let calls = tracing_calls(source);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, 1);
    assert_eq!(find_pattern(&calls[0].1), Some("medicine_name"));
}

fn find_pattern(call: &str) -> Option<&'static str> {
    NAME_PATTERNS.iter().copied().find(|p| call.contains(p))
}

fn scan_directory(dir: &Path, violations: &mut Vec<(String, usize, String, String)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_directory(&path, violations);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            scan_file(&path, violations);
        }
    }
}

fn scan_file(path: &Path, violations: &mut Vec<(String, usize, String, String)>) {
    let filename = path.file_name().unwrap_or_default().to_string_lossy();
    if ALLOWLIST.iter().any(|a| filename.contains(a)) {
        return;
    }
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let relative = path
        .strip_prefix(Path::new(env!("CARGO_MANIFEST_DIR")).join("src"))
        .unwrap_or(path)
        .display()
        .to_string();

    for (line, call) in tracing_calls(&content) {
        if let Some(pattern) = find_pattern(&call) {
            violations.push((relative.clone(), line, call, pattern.to_string()));
        }
    }
}

/// Full text of every tracing macro call with its 1-indexed start line.
fn tracing_calls(content: &str) -> Vec<(usize, String)> {
    const MACROS: &[&str] = &[
        "tracing::info!",
        "tracing::warn!",
        "tracing::error!",
        "tracing::debug!",
        "tracing::trace!",
    ];

    let lines: Vec<&str> = content.lines().collect();
    let mut calls = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if !MACROS.iter().any(|m| trimmed.starts_with(m)) {
            i += 1;
            continue;
        }

        let mut call = String::from(trimmed);
        let mut depth = paren_delta(trimmed);
        let mut j = i + 1;
        while depth > 0 && j < lines.len() {
            let next = lines[j].trim();
            call.push(' ');
            call.push_str(next);
            depth += paren_delta(next);
            j += 1;
        }
        calls.push((i + 1, call));
        i = j;
    }
    calls
}

fn paren_delta(s: &str) -> i32 {
    s.chars().fold(0, |d, ch| match ch {
        '(' => d + 1,
        ')' => d - 1,
        _ => d,
    })
}
