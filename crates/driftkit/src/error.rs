//! Error types for drift detection.
//!
//! Errors are categorized so the pipeline can decide whether a failure is
//! absorbed into the report (most of them) or aborts the run (a missing
//! baseline root, an attempt to write outside the annotation namespace).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Categories of drift errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A resource type could not be listed or exported
    PartialExport,
    /// Decompilation failed or was truncated
    Compile,
    /// Two baseline files declare the same identity
    IdentityConflict,
    /// Resource or environment not found
    NotFound,
    /// An external call exceeded its time budget
    Timeout,
    /// Required external tool is not installed
    ToolMissing,
    /// Structural contract violation, never absorbed
    Contract,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether a failure of this category may be absorbed into the report.
    pub fn is_absorbable(&self) -> bool {
        !matches!(self, Self::Contract)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::PartialExport => "Resource type could not be exported",
            Self::Compile => "Decompilation failed",
            Self::IdentityConflict => "Duplicate resource identity",
            Self::NotFound => "Resource not found",
            Self::Timeout => "External call timed out",
            Self::ToolMissing => "Required tool not installed",
            Self::Contract => "Invalid input or layout",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::PartialExport => "Inspect the resources of this type manually",
            Self::Compile => "Run the decompiler by hand to see the full diagnostics",
            Self::IdentityConflict => "Rename or remove one of the duplicate declarations",
            Self::NotFound => "Verify the environment and resource identifiers",
            Self::Timeout => "Retry later or raise the timeout",
            Self::ToolMissing => "Install the Azure CLI (az) and the Bicep CLI (bicep)",
            Self::Contract => "Check the baseline path and output layout",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during drift detection.
#[derive(Debug, Error)]
pub enum Error {
    /// The baseline store root does not exist
    #[error("baseline directory not found: {0}")]
    BaselineNotFound(PathBuf),

    /// Refused to write a file that is not a drift annotation
    #[error("refusing to write non-annotation file: {0}")]
    ProtectedPath(PathBuf),

    /// Export of one or more resource types failed
    #[error("export failed: {message}")]
    PartialExport {
        /// Details from the exporter
        message: String,
    },

    /// Decompilation failed
    #[error("compile failed: {message}")]
    Compile {
        /// Details from the compiler
        message: String,
    },

    /// Resource or environment not found
    #[error("not found: {name}")]
    NotFound {
        /// What could not be found
        name: String,
    },

    /// External call exceeded its timeout
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Program that was running
        program: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// External tool not installed or not in PATH
    #[error("{0} not found in PATH")]
    ToolMissing(String),

    /// External command exited unsuccessfully
    #[error("command failed: {message}")]
    CommandFailed {
        /// Description of what command failed
        message: String,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal error
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::BaselineNotFound(_) | Error::ProtectedPath(_) => ErrorCategory::Contract,
            Error::PartialExport { .. } => ErrorCategory::PartialExport,
            Error::Compile { .. } => ErrorCategory::Compile,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::ToolMissing(_) => ErrorCategory::ToolMissing,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error may be absorbed into the report.
    pub fn is_absorbable(&self) -> bool {
        self.category().is_absorbable()
    }

    /// Create an error from `az`/`bicep` command output.
    ///
    /// Analyzes stderr to categorize the error appropriately.
    pub fn from_cli_output(program: &str, stderr: &str, subject: Option<&str>) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if stderr_lower.contains("resourcegroupnotfound")
            || stderr_lower.contains("resourcenotfound")
            || stderr_lower.contains("could not be found")
        {
            return Error::NotFound {
                name: subject.unwrap_or("unknown").to_string(),
            };
        }

        if stderr_lower.contains("could not get resources of the type")
            || stderr_lower.contains("export template")
        {
            return Error::PartialExport {
                message: stderr.trim().to_string(),
            };
        }

        if program == "bicep"
            && (stderr_lower.contains("decompil") || stderr_lower.contains("error bcp"))
        {
            return Error::Compile {
                message: stderr.trim().to_string(),
            };
        }

        Error::CommandFailed {
            message: format!(
                "{program} command failed{}",
                subject.map(|n| format!(" for {n}")).unwrap_or_default()
            ),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Result type for drift operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_errors_are_fatal() {
        let err = Error::BaselineNotFound(PathBuf::from("/nope"));
        assert_eq!(err.category(), ErrorCategory::Contract);
        assert!(!err.is_absorbable());

        let err = Error::ProtectedPath(PathBuf::from("main.bicep"));
        assert!(!err.is_absorbable());
    }

    #[test]
    fn test_per_resource_errors_are_absorbable() {
        let err = Error::Timeout {
            program: "az".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert!(err.is_absorbable());
        assert_eq!(err.to_string(), "az timed out after 5s");
    }

    #[test]
    fn test_from_cli_output_not_found() {
        let err = Error::from_cli_output(
            "az",
            "ERROR: (ResourceGroupNotFound) Resource group 'rg-x' could not be found.",
            Some("rg-x"),
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_from_cli_output_partial_export() {
        let err = Error::from_cli_output(
            "az",
            "WARNING: Could not get resources of the type 'Microsoft.Web/sites/slots'.",
            None,
        );
        assert_eq!(err.category(), ErrorCategory::PartialExport);
    }

    #[test]
    fn test_from_cli_output_compile() {
        let err = Error::from_cli_output("bicep", "Error BCP037: bad property", None);
        assert_eq!(err.category(), ErrorCategory::Compile);
    }

    #[test]
    fn test_from_cli_output_fallback() {
        let err = Error::from_cli_output("az", "boom", Some("vm1"));
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "command failed: az command failed for vm1");
    }
}
