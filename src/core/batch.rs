//! Batch runner.
//!
//! Runs a list of work units through the fallback controller, writes each
//! artifact, and records per-unit results. One unit's exhaustion never stops
//! the batch; only an operator abort does, and even then in-flight units
//! drain before the runner returns.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::fallback::{ProviderFallbackController, ProviderSnapshot};
use super::orchestrator::SchedulingMode;
use super::work::{AttemptSummary, GenerationOutcome, WorkUnit};
use crate::error::{GenpoolError, Result};
use crate::storage::artifacts::{ArtifactSink, file_stem};

// =============================================================================
// Batch file
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    List(Vec<WorkUnit>),
    Wrapped { units: Vec<WorkUnit> },
}

/// Parse work units from JSON: either a bare array or `{"units": [...]}`.
///
/// # Errors
///
/// Returns [`GenpoolError::BatchParse`] on malformed JSON, or when two ids
/// would write the same artifact file.
pub fn parse_batch(content: &str, origin: &str) -> Result<Vec<WorkUnit>> {
    let parsed: BatchFile =
        serde_json::from_str(content).map_err(|e| GenpoolError::BatchParse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
    let units = match parsed {
        BatchFile::List(units) | BatchFile::Wrapped { units } => units,
    };

    let mut seen: HashMap<String, &str> = HashMap::new();
    for unit in &units {
        if let Some(first) = seen.insert(artifact_key(&unit.id), unit.id.as_str()) {
            let message = if first == unit.id {
                format!("duplicate work unit id '{}'", unit.id)
            } else {
                format!(
                    "work unit ids '{first}' and '{}' map to the same artifact file",
                    unit.id
                )
            };
            return Err(GenpoolError::BatchParse {
                path: origin.to_string(),
                message,
            });
        }
    }
    Ok(units)
}

/// Key under which two unit ids would share an artifact file. Stems compare
/// case-insensitively for case-folding filesystems.
fn artifact_key(unit_id: &str) -> String {
    file_stem(unit_id).to_lowercase()
}

/// Read and parse a batch file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or
/// [`GenpoolError::BatchParse`] if it is malformed.
pub fn load_batch(path: &Path) -> Result<Vec<WorkUnit>> {
    let content = std::fs::read_to_string(path)?;
    parse_batch(&content, &path.display().to_string())
}

// =============================================================================
// Report types
// =============================================================================

/// Final state of one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Generated,
    Failed,
    Skipped,
    Cancelled,
}

impl UnitStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result for one work unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitResult {
    pub id: String,
    pub status: UnitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<AttemptSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl UnitResult {
    fn bare(id: &str, status: UnitStatus) -> Self {
        Self {
            id: id.to_string(),
            status,
            provider: None,
            target: None,
            credential_fingerprint: None,
            path: None,
            summary: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub mode: SchedulingMode,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub units: Vec<UnitResult>,
    pub providers: Vec<ProviderSnapshot>,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.units.len()
    }

    /// Batch-level error for the exit code: cancellation first, then
    /// failed units.
    #[must_use]
    pub fn error(&self) -> Option<GenpoolError> {
        if self.cancelled > 0 {
            Some(GenpoolError::Cancelled {
                completed: self.succeeded + self.failed + self.skipped,
            })
        } else if self.failed > 0 {
            Some(GenpoolError::BatchIncomplete {
                failed: self.failed,
                total: self.total(),
            })
        } else {
            None
        }
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Batch scheduling options.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub mode: SchedulingMode,
    /// Work units in progress at once.
    pub max_parallel_units: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: SchedulingMode::Sequential,
            max_parallel_units: 1,
        }
    }
}

/// Runs work units and writes their artifacts.
#[derive(Debug)]
pub struct BatchRunner {
    controller: ProviderFallbackController,
    sink: ArtifactSink,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl BatchRunner {
    #[must_use]
    pub fn new(
        controller: ProviderFallbackController,
        sink: ArtifactSink,
        options: BatchOptions,
    ) -> Self {
        Self {
            controller,
            sink,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the batch when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every unit. Results keep the input order.
    pub async fn run(&self, units: Vec<WorkUnit>) -> BatchReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let parallel = self.options.max_parallel_units.max(1);

        tracing::info!(
            units = units.len(),
            mode = self.options.mode.label(),
            parallel,
            primary = %self.controller.primary(),
            "Starting batch"
        );

        // parse_batch rejects these; units built in code are checked here.
        let mut keys = HashSet::new();
        let collides: Vec<bool> = units
            .iter()
            .map(|u| !keys.insert(artifact_key(&u.id)))
            .collect();
        let collides = &collides;

        let mut indexed: Vec<(usize, UnitResult)> = futures::stream::iter(units.into_iter().enumerate())
            .map(|(idx, unit)| async move {
                if collides[idx] {
                    tracing::warn!(unit = %unit.id, "Artifact file already claimed by an earlier unit");
                    let mut result = UnitResult::bare(&unit.id, UnitStatus::Failed);
                    result.error = Some("artifact file name collides with an earlier unit".to_string());
                    return (idx, result);
                }
                (idx, self.run_unit(&unit).await)
            })
            .buffer_unordered(parallel)
            .collect()
            .await;
        indexed.sort_by_key(|(idx, _)| *idx);
        let units: Vec<UnitResult> = indexed.into_iter().map(|(_, r)| r).collect();

        let count = |status: UnitStatus| units.iter().filter(|u| u.status == status).count();
        let report = BatchReport {
            mode: self.options.mode,
            started_at,
            duration_ms: elapsed_ms(start),
            succeeded: count(UnitStatus::Generated),
            failed: count(UnitStatus::Failed),
            skipped: count(UnitStatus::Skipped),
            cancelled: count(UnitStatus::Cancelled),
            providers: self.controller.registry().snapshots(),
            units,
        };

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Batch finished"
        );
        report
    }

    async fn run_unit(&self, unit: &WorkUnit) -> UnitResult {
        if self.cancel.is_cancelled() {
            return UnitResult::bare(&unit.id, UnitStatus::Cancelled);
        }

        if let Some(path) = self.sink.exists(&unit.id) {
            tracing::info!(unit = %unit.id, path = %path.display(), "Artifact exists, skipping");
            let mut result = UnitResult::bare(&unit.id, UnitStatus::Skipped);
            result.path = Some(path);
            return result;
        }

        let start = Instant::now();
        let outcome = self
            .controller
            .generate_with(unit, self.options.mode, &self.cancel)
            .await;
        let mut result = UnitResult::bare(&unit.id, UnitStatus::Failed);
        result.summary = Some(*outcome.summary());

        match outcome {
            GenerationOutcome::Generated { artifact, .. } => {
                result.provider = Some(artifact.provider.clone());
                result.target = Some(artifact.target.clone());
                result.credential_fingerprint = Some(artifact.credential_fingerprint.clone());
                match self.sink.write(&unit.id, &artifact) {
                    Ok(path) => {
                        tracing::info!(
                            unit = %unit.id,
                            provider = %artifact.provider,
                            target = %artifact.target,
                            path = %path.display(),
                            "Unit generated"
                        );
                        result.status = UnitStatus::Generated;
                        result.path = Some(path);
                    }
                    Err(err) => {
                        tracing::error!(unit = %unit.id, error = %err, "Failed to write artifact");
                        result.error = Some(err.to_string());
                    }
                }
            }
            _ if self.cancel.is_cancelled() => {
                result.status = UnitStatus::Cancelled;
            }
            other => {
                tracing::warn!(unit = %unit.id, outcome = other.label(), "Unit failed");
                result.error = Some(format!(
                    "no credential/target combination succeeded after {} call(s)",
                    other.summary().invocations
                ));
            }
        }

        result.duration_ms = elapsed_ms(start);
        result
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_array_and_wrapped_form() {
        let bare = parse_batch(r#"[{"id": "a", "payload": "x"}]"#, "inline").unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_batch(
            r#"{"units": [{"id": "a", "payload": "x", "targets": ["t"], "fallbacks": [{"provider": "alt"}]}]}"#,
            "inline",
        )
        .unwrap();
        assert_eq!(wrapped[0].targets, vec!["t".to_string()]);
        assert_eq!(wrapped[0].fallbacks[0].provider, "alt");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = parse_batch(
            r#"[{"id": "a", "payload": "x"}, {"id": "a", "payload": "y"}]"#,
            "batch.json",
        )
        .unwrap_err();
        assert!(matches!(err, GenpoolError::BatchParse { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn ids_sharing_an_artifact_file_are_rejected() {
        for (a, b) in [("scene 1", "scene_1"), ("Scene-01", "scene-01"), ("a/b", "a_b")] {
            let batch = serde_json::json!([
                {"id": a, "payload": "x"},
                {"id": b, "payload": "y"}
            ]);
            let err = parse_batch(&batch.to_string(), "batch.json").unwrap_err();
            assert!(
                err.to_string().contains("same artifact file"),
                "{a:?} vs {b:?}: {err}"
            );
        }
    }

    #[test]
    fn distinct_stems_are_accepted() {
        let units = parse_batch(
            r#"[{"id": "scene_1", "payload": "x"}, {"id": "scene_2", "payload": "y"}]"#,
            "batch.json",
        )
        .unwrap();
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn malformed_json_is_batch_parse_error() {
        let err = parse_batch("{not json", "batch.json").unwrap_err();
        assert_eq!(err.error_code(), "GENPOOL-C010");
    }

    #[test]
    fn report_error_prefers_cancellation() {
        let report = BatchReport {
            mode: SchedulingMode::Sequential,
            started_at: Utc::now(),
            duration_ms: 0,
            succeeded: 1,
            failed: 1,
            skipped: 0,
            cancelled: 1,
            units: vec![],
            providers: vec![],
        };
        assert!(matches!(
            report.error(),
            Some(GenpoolError::Cancelled { completed: 2 })
        ));
    }
}
