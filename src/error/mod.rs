//! Error types for genpool.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into five main categories:
//! - **Configuration**: Config file parsing, validation, or missing values
//! - **Credential**: Credential sources that are missing or yield nothing
//! - **Provider**: Unknown providers, empty target lists, exhausted work
//! - **Network**: HTTP client construction and transport setup
//! - **Internal**: I/O, serialization, unexpected state
//!
//! Per-attempt generation failures are NOT errors at this level. They are
//! classified by [`crate::core::classifier`] and handled inside the
//! orchestrator; only batch-level and setup failures surface here.
//!
//! Each error has a stable error code (e.g., `GENPOOL-C001`) for programmatic handling.

pub mod suggestions;

use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (parse errors, invalid values, missing files).
    Configuration,
    /// Credential source issues (missing directory, no keys found).
    Credential,
    /// Provider issues (unknown provider, no targets, exhausted units).
    Provider,
    /// Network setup issues (client construction).
    Network,
    /// Internal errors (I/O, JSON, unexpected state).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Credential => "Credential error",
            Self::Provider => "Provider error",
            Self::Network => "Network error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Credential => "K",
            Self::Provider => "P",
            Self::Network => "N",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure, or at least one work unit failed
    GeneralError = 1,
    /// Invalid configuration or arguments
    ConfigError = 3,
    /// Operator abort
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for genpool operations.
#[derive(Error, Debug)]
pub enum GenpoolError {
    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Batch file could not be parsed.
    #[error("invalid batch file {path}: {message}")]
    BatchParse { path: String, message: String },

    // ==========================================================================
    // Credential errors (Category: Credential)
    // ==========================================================================
    /// A credential source could not be read.
    #[error("credential source unavailable for {provider}: {reason}")]
    CredentialSource { provider: String, reason: String },

    /// A credential source was readable but yielded no credentials.
    #[error("no credentials loaded for provider {0}")]
    NoCredentials(String),

    // ==========================================================================
    // Provider errors (Category: Provider)
    // ==========================================================================
    /// Provider name not present in the configuration.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider configured without any target.
    #[error("provider {0} has no targets configured")]
    NoTargets(String),

    /// Some work units in a batch were exhausted.
    #[error("batch incomplete: {failed} of {total} work unit(s) failed")]
    BatchIncomplete { failed: usize, total: usize },

    /// The batch was aborted by the operator.
    #[error("batch cancelled after {completed} work unit(s)")]
    Cancelled { completed: usize },

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// HTTP client could not be built.
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==========================================================================
    // Generic wrapper (Category: Internal)
    // ==========================================================================
    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GenpoolError {
    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::BatchParse { .. }
            | Self::UnknownProvider(_)
            | Self::NoTargets(_)
            | Self::CredentialSource { .. }
            | Self::NoCredentials(_) => ExitCode::ConfigError,

            Self::Cancelled { .. } => ExitCode::Cancelled,

            Self::BatchIncomplete { .. }
            | Self::Network(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::BatchParse { .. } => ErrorCategory::Configuration,

            Self::CredentialSource { .. } | Self::NoCredentials(_) => ErrorCategory::Credential,

            Self::UnknownProvider(_)
            | Self::NoTargets(_)
            | Self::BatchIncomplete { .. }
            | Self::Cancelled { .. } => ErrorCategory::Provider,

            Self::Network(_) => ErrorCategory::Network,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `GENPOOL-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "GENPOOL-C001",
            Self::ConfigInvalid { .. } => "GENPOOL-C002",
            Self::Config(_) => "GENPOOL-C003",
            Self::BatchParse { .. } => "GENPOOL-C010",

            Self::CredentialSource { .. } => "GENPOOL-K001",
            Self::NoCredentials(_) => "GENPOOL-K002",

            Self::UnknownProvider(_) => "GENPOOL-P001",
            Self::NoTargets(_) => "GENPOOL-P002",
            Self::BatchIncomplete { .. } => "GENPOOL-P010",
            Self::Cancelled { .. } => "GENPOOL-P011",

            Self::Network(_) => "GENPOOL-N001",

            Self::Io(_) => "GENPOOL-X001",
            Self::Json(_) => "GENPOOL-X002",
            Self::Other(_) => "GENPOOL-X099",
        }
    }

    /// Returns whether re-running the same command could succeed without
    /// operator changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BatchIncomplete { .. } | Self::Network(_))
    }

    /// Returns the provider name if this error is provider-specific.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::CredentialSource { provider, .. } => Some(provider),
            Self::NoCredentials(p) | Self::UnknownProvider(p) | Self::NoTargets(p) => Some(p),
            _ => None,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::ConfigParse { path, message } => {
                suggestions::config_parse_suggestions(path, message)
            }
            Self::ConfigInvalid {
                key,
                value,
                message,
            } => suggestions::config_invalid_suggestions(key, value, message),
            Self::Config(msg) => vec![FixSuggestion::new(
                vec!["genpool keys".to_string()],
                format!("Configuration error: {msg}"),
            )],
            Self::BatchParse { path, message } => {
                suggestions::batch_parse_suggestions(path, message)
            }
            Self::CredentialSource { provider, reason } => {
                suggestions::credential_source_suggestions(provider, reason)
            }
            Self::NoCredentials(provider) => suggestions::no_credentials_suggestions(provider),
            Self::UnknownProvider(name) => suggestions::unknown_provider_suggestions(name),
            Self::NoTargets(provider) => vec![FixSuggestion::new(
                vec![format!("# add targets = [...] to the '{provider}' provider entry")],
                format!("Provider {provider} cannot be used without at least one target."),
            )],
            Self::BatchIncomplete { failed, .. } => {
                suggestions::batch_incomplete_suggestions(*failed)
            }
            Self::Cancelled { .. } => vec![FixSuggestion::new(
                vec!["genpool run --batch <file>".to_string()],
                "The batch was aborted. Units with existing artifacts are skipped on re-run.",
            )],
            Self::Network(msg) => vec![FixSuggestion::new(
                vec!["# check proxy and TLS settings".to_string()],
                format!("Network setup failed: {msg}"),
            )],
            Self::Io(err) => vec![FixSuggestion::new(
                vec!["# Check file permissions and disk space".to_string()],
                format!("I/O error: {err}. Check file permissions and available disk space."),
            )],
            Self::Json(err) => vec![FixSuggestion::new(
                vec!["# validate the file with a JSON linter".to_string()],
                format!("JSON error: {err}."),
            )],
            Self::Other(err) => vec![FixSuggestion::new(
                vec!["genpool --verbose ...".to_string()],
                format!("Unexpected error: {err}. Re-run with --verbose for details."),
            )],
        }
    }
}

/// Result type alias for genpool operations.
pub type Result<T> = std::result::Result<T, GenpoolError>;

// =============================================================================
// Tests
// =============================================================================
