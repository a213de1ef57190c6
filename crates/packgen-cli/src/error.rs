//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use miette::Diagnostic;
use packgen_convert::ConvertError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Configuration or pack identity rejected
    #[error("Pack error: {message}")]
    #[diagnostic(code(packgen::cli::pack))]
    Pack {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Some resources could not be converted
    #[error("{failed} resource(s) failed to convert")]
    #[diagnostic(
        code(packgen::cli::conversion),
        help("Run with --debug for details on each failure")
    )]
    ConversionFailed { failed: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(packgen::cli::io))]
    Io {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(packgen::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Pack { .. } => exit_codes::PACK_ERROR,
            CliError::ConversionFailed { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
            help: None,
        }
    }
}

impl From<ConvertError> for CliError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::OutputExists(path) => CliError::Io {
                message: format!("output directory {} is not empty", path.display()),
                help: Some("Use --force to write into it anyway".to_string()),
            },
            ConvertError::Io(_) | ConvertError::FileNotFound(_) => CliError::Io {
                message: err.to_string(),
                help: None,
            },
            ConvertError::InvalidConfig(_) | ConvertError::Core(_) => CliError::Pack {
                message: err.to_string(),
                help: Some(format!(
                    "Check {} or the --name/--pack-version flags",
                    packgen_convert::config::CONFIG_FILE_NAME
                )),
            },
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        let exists: CliError = ConvertError::OutputExists(PathBuf::from("out")).into();
        assert_eq!(exists.exit_code(), exit_codes::IO_ERROR);

        let config: CliError = ConvertError::InvalidConfig("bad".into()).into();
        assert_eq!(config.exit_code(), exit_codes::PACK_ERROR);

        assert_eq!(CliError::ConversionFailed { failed: 2 }.exit_code(), exit_codes::ERROR);
    }
}
