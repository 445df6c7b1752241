//! Failure classification.
//!
//! Maps a raw error signal from a generation attempt (a status code and/or
//! free-text message) onto one [`FailureCategory`]. This is the only place in
//! the crate that inspects raw error text.
//!
//! Structured status codes are checked first. Message heuristics apply only
//! when the status is missing, unrecognised, or an ambiguous 400.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// =============================================================================
// Error Signal
// =============================================================================

/// Raw failure information from one downstream call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignal {
    /// Transport status code, when the transport exposes one.
    pub status: Option<u16>,
    /// Free-text error message.
    pub message: String,
}

impl ErrorSignal {
    #[must_use]
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        Self {
            status: Some(status),
            message: String::new(),
        }
    }

    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Connect, timeout and decode failures: no status code.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::from_message(message)
    }

    /// Classify this signal.
    #[must_use]
    pub fn classify(&self) -> FailureCategory {
        classify(self)
    }
}

impl fmt::Display for ErrorSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) if self.message.is_empty() => write!(f, "HTTP {status}"),
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

// =============================================================================
// Failure Category
// =============================================================================

/// Category of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Temporarily throttled; recoverable after cooldown.
    RateLimited,
    /// Quota exhausted, billing required, or invalid credential.
    PermanentlyRejected,
    /// Target not found, or needs a tier the credential lacks.
    TargetUnavailable,
    /// Safety or responsible-use filter triggered.
    ContentPolicyRejected,
    /// Anything else, including timeouts and network errors.
    Transient,
}

impl FailureCategory {
    pub const ALL: [Self; 5] = [
        Self::RateLimited,
        Self::PermanentlyRejected,
        Self::TargetUnavailable,
        Self::ContentPolicyRejected,
        Self::Transient,
    ];

    /// Stable label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::PermanentlyRejected => "permanently_rejected",
            Self::TargetUnavailable => "target_unavailable",
            Self::ContentPolicyRejected => "content_policy_rejected",
            Self::Transient => "transient",
        }
    }

    /// Whether this outcome ends the current credential's turn.
    #[must_use]
    pub const fn ends_credential_turn(self) -> bool {
        matches!(self, Self::RateLimited | Self::PermanentlyRejected)
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Phrase tables
// =============================================================================

const PERMANENT_PHRASES: &[&str] = &[
    "not been used",
    "disabled",
    "quota",
    "billing",
    "api key not valid",
    "invalid api key",
    "api key expired",
    "insufficient balance",
];

const RATE_PHRASES: &[&str] = &["rate limit", "too many requests"];

const POLICY_PHRASES: &[&str] = &[
    "responsible ai",
    "filtered out",
    "safety",
    "content policy",
];

const TIER_PHRASES: &[&str] = &["billed users", "only accessible to billed"];

const TARGET_PHRASES: &[&str] = &["not found", "not available", "not supported"];

static CODE_403: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b403\b").unwrap());
static CODE_429: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b429\b").unwrap());
static CODE_404: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b404\b").unwrap());

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| haystack.contains(p))
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a raw signal. Pure and deterministic.
#[must_use]
pub fn classify(signal: &ErrorSignal) -> FailureCategory {
    let message = signal.message.to_lowercase();

    if let Some(status) = signal.status
        && let Some(category) = classify_status(status, &message)
    {
        return category;
    }

    classify_message(&message)
}

fn classify_status(status: u16, message: &str) -> Option<FailureCategory> {
    match status {
        429 => Some(FailureCategory::RateLimited),
        401..=403 => Some(FailureCategory::PermanentlyRejected),
        404 => Some(FailureCategory::TargetUnavailable),
        408 | 500..=599 => Some(FailureCategory::Transient),
        400 => Some(classify_bad_request(message)),
        _ => None,
    }
}

/// A 400 carries policy and tier rejections; anything else takes the
/// message path so it agrees with a status-less signal.
fn classify_bad_request(message: &str) -> FailureCategory {
    if contains_any(message, POLICY_PHRASES) {
        FailureCategory::ContentPolicyRejected
    } else if contains_any(message, TIER_PHRASES) {
        FailureCategory::TargetUnavailable
    } else {
        classify_message(message)
    }
}

fn classify_message(message: &str) -> FailureCategory {
    if CODE_403.is_match(message) || contains_any(message, PERMANENT_PHRASES) {
        FailureCategory::PermanentlyRejected
    } else if CODE_429.is_match(message) || contains_any(message, RATE_PHRASES) {
        FailureCategory::RateLimited
    } else if contains_any(message, POLICY_PHRASES) {
        FailureCategory::ContentPolicyRejected
    } else if contains_any(message, TIER_PHRASES)
        || CODE_404.is_match(message)
        || contains_any(message, TARGET_PHRASES)
    {
        FailureCategory::TargetUnavailable
    } else {
        FailureCategory::Transient
    }
}
