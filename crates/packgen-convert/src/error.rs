//! Error and warning types for the converter
//!
//! Errors abort the processing of a single resource (or of the whole run when
//! they come from loading or writing). Warnings never abort anything: they
//! record what the converter decided on the user's behalf.

use std::path::PathBuf;
use thiserror::Error;

/// Converter error
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] packgen_core::CoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processor '{0}' declares no supported kinds")]
    InvalidProcessor(String),

    #[error("Processor '{processor}' failed on {resource}: {message}")]
    ProcessorFailed {
        processor: String,
        resource: String,
        message: String,
    },

    #[error("Failed to persist external file {path}: {message}")]
    Persist { path: String, message: String },

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Output directory already exists: {0}")]
    OutputExists(PathBuf),
}

impl ConvertError {
    /// Whether the error came from rejecting the input object itself
    pub fn is_input_rejection(&self) -> bool {
        matches!(self, ConvertError::InvalidInput(_))
    }
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

// =============================================================================
// WARNING SYSTEM
// =============================================================================

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningSeverity {
    /// Informational - conversion succeeded, a decision was made automatically
    Info,
    /// Warning - conversion succeeded but manual review recommended
    Warning,
    /// Error - this resource could not be converted
    Error,
}

impl WarningSeverity {
    /// Get the icon for this severity
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Info => "ℹ",
            Self::Warning => "⚠",
            Self::Error => "✗",
        }
    }

    /// Get the label for this severity
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Warning category for grouping related warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCategory {
    /// Kind without a registered processor
    Unsupported,
    /// External file could not be written, value kept inline
    Externalization,
    /// Optional field present with an unexpected type
    MalformedField,
    /// Dependency guessed from a label selector
    InferredDependency,
    /// Manifest document could not be parsed
    Loading,
    /// Two resources map to the same package location
    Conflict,
}

impl WarningCategory {
    /// Get the display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Externalization => "externalization",
            Self::MalformedField => "malformed-field",
            Self::InferredDependency => "inferred-dependency",
            Self::Loading => "loading",
            Self::Conflict => "conflict",
        }
    }
}

/// Non-fatal diagnostic attached to a resource (or a source file)
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionWarning {
    pub severity: WarningSeverity,
    pub category: WarningCategory,
    /// Resource id (`Kind/namespace/name`) or source file
    pub resource: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ConversionWarning {
    /// Create an info-level warning
    pub fn info(category: WarningCategory, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Info,
            category,
            resource: resource.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create a warning-level warning
    pub fn warning(category: WarningCategory, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Warning,
            category,
            resource: resource.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Create an error-level warning
    pub fn error(category: WarningCategory, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Error,
            category,
            resource: resource.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add suggestion to warning
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: [severity] resource - message
        write!(f, "[{}] {} - {}", self.severity.label(), self.resource, self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  {} {}", self.severity.icon(), suggestion)?;
        }

        Ok(())
    }
}

/// Factory functions for common warnings
pub mod warnings {
    use super::*;

    pub fn unsupported_kind(resource: &str, api_version: &str) -> ConversionWarning {
        ConversionWarning::info(
            WarningCategory::Unsupported,
            resource,
            format!("no processor handles {}, resource skipped", api_version),
        )
    }

    pub fn inlined_after_persist_failure(resource: &str, key: &str, reason: &str) -> ConversionWarning {
        ConversionWarning::warning(
            WarningCategory::Externalization,
            resource,
            format!("'{}' kept inline: {}", key, reason),
        )
        .with_suggestion("Check that the output directory is writable")
    }

    pub fn malformed_field(resource: &str, path: &str, expected: &str, found: &str) -> ConversionWarning {
        ConversionWarning::warning(
            WarningCategory::MalformedField,
            resource,
            format!("'{}' is a {}, expected {}; field ignored", path, found, expected),
        )
    }

    pub fn inferred_dependency(resource: &str, target: &str) -> ConversionWarning {
        ConversionWarning::info(
            WarningCategory::InferredDependency,
            resource,
            format!("dependency on {} guessed from label selector", target),
        )
        .with_suggestion("Verify the selector matches the intended workload")
    }

    pub fn duplicate_template(resource: &str, path: &str, kept: &str) -> ConversionWarning {
        ConversionWarning::error(
            WarningCategory::Conflict,
            resource,
            format!("template {} already produced by {}, resource dropped", path, kept),
        )
        .with_suggestion("Give the resources distinct names or app labels")
    }

    pub fn values_path_renamed(resource: &str, wanted: &str, used: &str, owner: &str) -> ConversionWarning {
        ConversionWarning::warning(
            WarningCategory::Conflict,
            resource,
            format!("values.{} already used by {}, values moved to values.{}", wanted, owner, used),
        )
        .with_suggestion("Give the resources names that differ by more than punctuation")
    }

    pub fn unannotated_dependency(resource: &str, reason: &str) -> ConversionWarning {
        ConversionWarning::warning(
            WarningCategory::Conflict,
            resource,
            format!("wait-for annotation not added: {}", reason),
        )
    }

    pub fn unparseable_document(file: &str, index: usize, reason: &str) -> ConversionWarning {
        ConversionWarning::warning(
            WarningCategory::Loading,
            file,
            format!("document {} skipped: {}", index, reason),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = warnings::inlined_after_persist_failure("Secret/default/tls", "tls.crt", "disk full");
        let text = w.to_string();
        assert!(text.starts_with("[warning] Secret/default/tls - 'tls.crt' kept inline: disk full"));
        assert!(text.contains("writable"));
    }

    #[test]
    fn test_severity_order() {
        assert!(WarningSeverity::Info < WarningSeverity::Warning);
        assert!(WarningSeverity::Warning < WarningSeverity::Error);
    }

    #[test]
    fn test_input_rejection() {
        assert!(ConvertError::InvalidInput("empty".into()).is_input_rejection());
        assert!(!ConvertError::InvalidProcessor("x".into()).is_input_rejection());
    }
}
