//! Work units, artifacts and generation outcomes.

use serde::{Deserialize, Serialize};

use super::classifier::FailureCategory;
use super::credential::Credential;

// =============================================================================
// Work Unit
// =============================================================================

/// An alternate provider to try when the primary rejects content on policy
/// grounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateProvider {
    /// Provider name as configured.
    pub provider: String,
    /// Targets for this provider. Empty means the provider's default list.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl AlternateProvider {
    #[must_use]
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Identifier, also used as the artifact file stem.
    pub id: String,
    /// Prompt or text to synthesize.
    pub payload: String,
    /// Candidate targets, most preferred first. Empty means the provider's
    /// default list.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Alternate providers, tried in order.
    #[serde(default)]
    pub fallbacks: Vec<AlternateProvider>,
}

impl WorkUnit {
    #[must_use]
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            targets: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_targets<S: Into<String>>(mut self, targets: impl IntoIterator<Item = S>) -> Self {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: AlternateProvider) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    /// The same payload re-targeted at an alternate provider.
    #[must_use]
    pub fn for_alternate(&self, alternate: &AlternateProvider) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            targets: alternate.targets.clone(),
            fallbacks: Vec::new(),
        }
    }
}

// =============================================================================
// Artifact
// =============================================================================

/// Raw output of a successful downstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl Generated {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }
}

/// A generated artifact together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub credential_fingerprint: String,
    pub target: String,
    pub provider: String,
}

impl Artifact {
    #[must_use]
    pub fn from_generated(
        generated: Generated,
        credential: &Credential,
        target: &str,
        provider: &str,
    ) -> Self {
        Self {
            bytes: generated.bytes,
            media_type: generated.media_type,
            credential_fingerprint: credential.fingerprint(),
            target: target.to_string(),
            provider: provider.to_string(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Result of one downstream invocation. Logged, not retained.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub credential: Credential,
    pub target: String,
    /// `None` on success.
    pub category: Option<FailureCategory>,
    pub artifact: Option<Artifact>,
}

/// Counters for one `attempt` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    /// Credential selections that consumed a ceiling slot.
    pub selections: usize,
    /// Downstream calls made.
    pub invocations: usize,
    pub rate_limited: usize,
    pub permanently_rejected: usize,
    pub target_unavailable: usize,
    pub content_policy_rejected: usize,
    pub transient: usize,
}

impl AttemptSummary {
    pub const fn record(&mut self, category: FailureCategory) {
        match category {
            FailureCategory::RateLimited => self.rate_limited += 1,
            FailureCategory::PermanentlyRejected => self.permanently_rejected += 1,
            FailureCategory::TargetUnavailable => self.target_unavailable += 1,
            FailureCategory::ContentPolicyRejected => self.content_policy_rejected += 1,
            FailureCategory::Transient => self.transient += 1,
        }
    }

    /// True when every invocation was a content-policy rejection.
    #[must_use]
    pub const fn all_policy_rejections(&self) -> bool {
        self.invocations > 0 && self.content_policy_rejected == self.invocations
    }

    pub const fn merge(&mut self, other: &Self) {
        self.selections += other.selections;
        self.invocations += other.invocations;
        self.rate_limited += other.rate_limited;
        self.permanently_rejected += other.permanently_rejected;
        self.target_unavailable += other.target_unavailable;
        self.content_policy_rejected += other.content_policy_rejected;
        self.transient += other.transient;
    }
}

/// Final result for one work unit on one provider (or a fallback chain).
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Generated {
        artifact: Artifact,
        summary: AttemptSummary,
    },
    /// No credential/target combination could produce an artifact.
    Exhausted { summary: AttemptSummary },
    /// Every attempt was rejected by a content policy.
    ExhaustedByPolicy { summary: AttemptSummary },
}

impl GenerationOutcome {
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }

    #[must_use]
    pub const fn is_policy_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedByPolicy { .. })
    }

    #[must_use]
    pub const fn summary(&self) -> &AttemptSummary {
        match self {
            Self::Generated { summary, .. }
            | Self::Exhausted { summary }
            | Self::ExhaustedByPolicy { summary } => summary,
        }
    }

    #[must_use]
    pub const fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Generated { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_artifact(self) -> Option<Artifact> {
        match self {
            Self::Generated { artifact, .. } => Some(artifact),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Generated { .. } => "generated",
            Self::Exhausted { .. } => "exhausted",
            Self::ExhaustedByPolicy { .. } => "exhausted_by_policy",
        }
    }
}
