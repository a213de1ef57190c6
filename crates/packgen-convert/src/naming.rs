//! Name and path helpers shared by the processors and the file store

use once_cell::sync::Lazy;
use packgen_core::SourceObject;
use regex::Regex;

/// Labels consulted, in order, to group a resource under a service
const SERVICE_LABELS: &[&str] = &[
    "app.kubernetes.io/name",
    "app",
    "app.kubernetes.io/part-of",
];

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9._-]+").expect("path character class is valid"));

static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").expect("dash pattern is valid"));

/// Reduce one path segment to `[a-z0-9._-]`
///
/// Never returns an empty string, `.` or `..`.
pub fn sanitize_segment(segment: &str) -> String {
    let lowered = segment.to_lowercase();
    let replaced = UNSAFE_CHARS.replace_all(&lowered, "-");
    let collapsed = DASH_RUNS.replace_all(&replaced, "-");
    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '.');

    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitize every `/`-separated segment, dropping empty ones
pub fn sanitize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.trim().is_empty())
        .map(sanitize_segment)
        .collect();

    if segments.is_empty() {
        "unnamed".to_string()
    } else {
        segments.join("/")
    }
}

/// `my-app.config_v2` -> `myAppConfigV2`, `LOG_LEVEL` -> `logLevel`
///
/// Result is a valid values path segment: starts with a letter or `_`.
pub fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());

    for word in input.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let word = if word.chars().all(|c| !c.is_ascii_lowercase()) {
            word.to_ascii_lowercase()
        } else {
            word.to_string()
        };
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if out.is_empty() {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }

    match out.chars().next() {
        None => "_".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{}", out),
        Some(_) => out,
    }
}

/// Logical service a resource belongs to
pub fn service_name(obj: &SourceObject) -> String {
    SERVICE_LABELS
        .iter()
        .find_map(|label| obj.label(label).filter(|v| !v.is_empty()))
        .unwrap_or_else(|| obj.name())
        .to_string()
}
