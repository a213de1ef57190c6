//! Display formatting for CLI output
//!
//! Warnings are grouped by category, most important first. Info-level
//! notes are only listed in verbose mode; otherwise they are counted.

use console::style;
use packgen_convert::{ConversionWarning, ExternalFileRef, WarningCategory, WarningSeverity};
use std::collections::HashMap;

/// Category display order, with a heading and a hint
const SECTIONS: &[(WarningCategory, &str, &str)] = &[
    (WarningCategory::Conflict, "Conflicts", "resources dropped or not annotated"),
    (WarningCategory::Loading, "Loading", "documents that could not be read"),
    (WarningCategory::Externalization, "Externalization", "values kept inline"),
    (WarningCategory::MalformedField, "Malformed fields", "ignored, review the source"),
    (WarningCategory::InferredDependency, "Inferred dependencies", "guessed from selectors"),
    (WarningCategory::Unsupported, "Unsupported kinds", "skipped"),
];

pub fn print_header(title: &str, subtitle: &str) {
    println!();
    println!(
        "  {} {} {}",
        style(title).bold().cyan(),
        style("─").dim(),
        style(subtitle).dim()
    );
    println!();
}

pub fn print_section(title: &str) {
    println!("  {}", style(title).bold());
    println!("  {}", style("─".repeat(title.chars().count())).dim());
}

pub fn print_warnings(warnings: &[ConversionWarning], verbose: bool) {
    if warnings.is_empty() {
        return;
    }

    let significant = warnings
        .iter()
        .any(|w| w.severity != WarningSeverity::Info);
    if !significant && !verbose {
        println!(
            "  {} {} {} {}",
            style("ℹ").cyan(),
            warnings.len(),
            style("notes").dim(),
            style("(use --verbose to see details)").dim()
        );
        println!();
        return;
    }

    let mut by_category: HashMap<WarningCategory, Vec<&ConversionWarning>> = HashMap::new();
    for warning in warnings {
        if verbose || warning.severity != WarningSeverity::Info {
            by_category.entry(warning.category).or_default().push(warning);
        }
    }

    print_section("Conversion Notes");
    println!();
    for (category, heading, hint) in SECTIONS {
        let Some(entries) = by_category.get(category) else {
            continue;
        };
        println!("  {} {}", style(heading).yellow().bold(), style(format!("─ {}", hint)).dim());
        for warning in entries {
            print_warning(warning);
        }
        println!();
    }
}

fn print_warning(warning: &ConversionWarning) {
    let icon = match warning.severity {
        WarningSeverity::Info => style(warning.severity.icon()).cyan(),
        WarningSeverity::Warning => style(warning.severity.icon()).yellow(),
        WarningSeverity::Error => style(warning.severity.icon()).red().bold(),
    };

    println!("    {} {}", icon, style(&warning.resource).bold());
    println!("      {}", style(&warning.message).dim());
    if let Some(ref suggestion) = warning.suggestion {
        println!("      {} {}", style("→").green(), suggestion);
    }
}

/// `count label(s)`, right-aligned count
pub fn count_line(count: usize, label: &str, note: Option<&str>) -> String {
    format!(
        "{:>3} {}{}{}",
        count,
        label,
        if count == 1 { "" } else { "s" },
        note.map(|n| format!(" {}", n)).unwrap_or_default()
    )
}

/// `credential sha256:0123456789ab`
pub fn file_fingerprint(file: &ExternalFileRef) -> String {
    let short = file.checksum.get(..12).unwrap_or(&file.checksum);
    format!("{} sha256:{}", file.detected_type, short)
}

/// Rendered template size, in bytes below 10 KiB
pub fn byte_size(bytes: usize) -> String {
    if bytes < 10 * 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packgen_convert::ContentType;

    #[test]
    fn test_file_fingerprint() {
        let file = ExternalFileRef {
            path: "files/secret/shop/tls/tls.crt".to_string(),
            checksum: "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08".to_string(),
            detected_type: ContentType::Credential,
            source_resource: "Secret/shop/tls".to_string(),
        };
        assert_eq!(file_fingerprint(&file), "credential sha256:9f86d081884c");
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(byte_size(812), "812 B");
        assert_eq!(byte_size(20 * 1024 + 512), "20.5 KiB");
    }

    #[test]
    fn test_count_line() {
        assert_eq!(count_line(1, "resource", None), "  1 resource");
        assert_eq!(count_line(12, "template", Some("(rendered)")), " 12 templates (rendered)");
    }
}
