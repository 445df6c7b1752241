//! Output models shared by the CLI commands and renderers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classifier::{ErrorSignal, FailureCategory};
use super::credential::Credential;

/// Schema tag for robot output.
pub const SCHEMA_VERSION: &str = "genpool.v1";

// =============================================================================
// Robot Output Envelope
// =============================================================================

/// Envelope for robot-mode (JSON) output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotOutput<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,

    pub errors: Vec<String>,

    pub meta: RobotMeta,
}

/// Metadata for robot output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotMeta {
    pub format: String,
    pub version: String,
}

impl<T> RobotOutput<T> {
    /// Create a new robot output envelope.
    pub fn new(command: impl Into<String>, data: T) -> Self {
        Self::with_errors(command, data, Vec::new())
    }

    /// Create with errors.
    pub fn with_errors(command: impl Into<String>, data: T, errors: Vec<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            command: command.into(),
            data,
            errors,
            meta: RobotMeta {
                format: "json".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

// =============================================================================
// Key Listing
// =============================================================================

/// One masked credential in a key listing.
#[derive(Debug, Clone, Serialize)]
pub struct KeyEntry {
    pub masked: String,
    pub fingerprint: String,
}

impl From<&Credential> for KeyEntry {
    fn from(credential: &Credential) -> Self {
        Self {
            masked: credential.masked(),
            fingerprint: credential.fingerprint(),
        }
    }
}

/// Credentials loaded for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderKeys {
    pub provider: String,
    pub source: String,
    pub targets: Vec<String>,
    pub count: usize,
    pub keys: Vec<KeyEntry>,
    /// Set when the source could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProviderKeys {
    #[must_use]
    pub fn loaded(
        provider: impl Into<String>,
        source: impl Into<String>,
        targets: Vec<String>,
        credentials: &[Credential],
    ) -> Self {
        Self {
            provider: provider.into(),
            source: source.into(),
            targets,
            count: credentials.len(),
            keys: credentials.iter().map(KeyEntry::from).collect(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(
        provider: impl Into<String>,
        source: impl Into<String>,
        targets: Vec<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            source: source.into(),
            targets,
            count: 0,
            keys: Vec::new(),
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Result of classifying one raw signal.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub message: String,
    pub category: FailureCategory,
    /// Whether this category ends the credential's turn.
    pub ends_turn: bool,
    /// What the orchestrator does next.
    pub action: &'static str,
}

impl Classification {
    #[must_use]
    pub fn of(signal: &ErrorSignal) -> Self {
        let category = signal.classify();
        Self {
            status: signal.status,
            message: signal.message.clone(),
            category,
            ends_turn: category.ends_credential_turn(),
            action: action_for(category),
        }
    }
}

/// Orchestrator reaction to a category.
#[must_use]
pub const fn action_for(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::RateLimited => "cool the credential down and move to the next one",
        FailureCategory::PermanentlyRejected => "retire the credential for the rest of the run",
        FailureCategory::TargetUnavailable => {
            "mark the target unavailable for this credential and try the next target"
        }
        FailureCategory::ContentPolicyRejected => {
            "skip the target for this work unit; fall back to another provider if all attempts agree"
        }
        FailureCategory::Transient => "try the next target, keeping the credential alive",
    }
}
