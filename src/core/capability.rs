//! Per-credential, per-target capability matrix.
//!
//! Records whether a target is known to work, known to fail, or untested for
//! a given credential, and reorders candidate targets accordingly.
//!
//! Every update carries the dispatch instant of the attempt that produced it.
//! An update older than the one already stored for the same pair is dropped,
//! so a late result from a cancelled racing attempt never overwrites fresher
//! knowledge.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use super::credential::Credential;

/// Known capability of a (credential, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Available,
    #[default]
    Unknown,
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    capability: Capability,
    stamp: Option<Instant>,
}

/// Counts per capability value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub available: usize,
    pub unknown: usize,
    pub unavailable: usize,
}

/// Thread-safe capability table. One lock guards the whole table.
#[derive(Debug, Default)]
pub struct CapabilityMatrix {
    entries: Mutex<HashMap<(Credential, String), Entry>>,
}

impl CapabilityMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(Credential, String), Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the entry as `Unknown` if the pair has never been attempted.
    pub fn record_attempted(&self, credential: &Credential, target: &str) {
        self.lock()
            .entry((credential.clone(), target.to_string()))
            .or_insert(Entry {
                capability: Capability::Unknown,
                stamp: None,
            });
    }

    pub fn record_available(&self, credential: &Credential, target: &str) -> bool {
        self.record_at(credential, target, Capability::Available, Instant::now())
    }

    pub fn record_unavailable(&self, credential: &Credential, target: &str) -> bool {
        self.record_at(credential, target, Capability::Unavailable, Instant::now())
    }

    /// Record `capability` for the pair as observed by an attempt dispatched
    /// at `dispatched_at`. Returns `false` if a fresher value is already stored.
    pub fn record_at(
        &self,
        credential: &Credential,
        target: &str,
        capability: Capability,
        dispatched_at: Instant,
    ) -> bool {
        let mut entries = self.lock();
        let entry = entries
            .entry((credential.clone(), target.to_string()))
            .or_insert(Entry {
                capability: Capability::Unknown,
                stamp: None,
            });

        if entry.stamp.is_some_and(|stamp| stamp > dispatched_at) {
            tracing::debug!(
                credential = %credential.masked(),
                target,
                ?capability,
                "Ignoring stale capability update"
            );
            return false;
        }

        entry.capability = capability;
        entry.stamp = Some(dispatched_at);
        true
    }

    /// Current capability of the pair; `Unknown` if never recorded.
    #[must_use]
    pub fn status(&self, credential: &Credential, target: &str) -> Capability {
        self.lock()
            .get(&(credential.clone(), target.to_string()))
            .map_or(Capability::Unknown, |e| e.capability)
    }

    /// Reorder `candidates` for `credential`: `Available` first, then
    /// `Unknown`, each group in input order. `Unavailable` targets are dropped.
    #[must_use]
    pub fn ordered_targets(&self, credential: &Credential, candidates: &[String]) -> Vec<String> {
        let entries = self.lock();
        let lookup = |target: &String| {
            entries
                .get(&(credential.clone(), target.clone()))
                .map_or(Capability::Unknown, |e| e.capability)
        };

        let mut available = Vec::new();
        let mut unknown = Vec::new();
        for target in candidates {
            match lookup(target) {
                Capability::Available => available.push(target.clone()),
                Capability::Unknown => unknown.push(target.clone()),
                Capability::Unavailable => {}
            }
        }
        available.extend(unknown);
        available
    }

    #[must_use]
    pub fn summary(&self) -> MatrixSummary {
        let entries = self.lock();
        let mut summary = MatrixSummary::default();
        for entry in entries.values() {
            match entry.capability {
                Capability::Available => summary.available += 1,
                Capability::Unknown => summary.unknown += 1,
                Capability::Unavailable => summary.unavailable += 1,
            }
        }
        summary
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn unknown_by_default_and_lazily_created() {
        let matrix = CapabilityMatrix::new();
        let cred = Credential::new("credential-one-xyz");
        assert_eq!(matrix.status(&cred, "a"), Capability::Unknown);
        assert!(matrix.is_empty());

        matrix.record_attempted(&cred, "a");
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.status(&cred, "a"), Capability::Unknown);
    }

    #[test]
    fn ordered_targets_drops_unavailable_and_prefers_available() {
        let matrix = CapabilityMatrix::new();
        let x = Credential::new("credential-x-000000");
        matrix.record_unavailable(&x, "B");
        matrix.record_available(&x, "C");

        let ordered = matrix.ordered_targets(&x, &targets(&["A", "B", "C"]));
        assert_eq!(ordered, targets(&["C", "A"]));
    }

    #[test]
    fn ordered_targets_keeps_relative_order_within_groups() {
        let matrix = CapabilityMatrix::new();
        let x = Credential::new("credential-x-000000");
        matrix.record_available(&x, "D");
        matrix.record_available(&x, "B");

        let ordered = matrix.ordered_targets(&x, &targets(&["A", "B", "C", "D"]));
        assert_eq!(ordered, targets(&["B", "D", "A", "C"]));
    }

    #[test]
    fn entries_are_per_credential() {
        let matrix = CapabilityMatrix::new();
        let x = Credential::new("credential-x-000000");
        let y = Credential::new("credential-y-000000");
        matrix.record_unavailable(&x, "A");

        assert!(matrix.ordered_targets(&x, &targets(&["A"])).is_empty());
        assert_eq!(matrix.ordered_targets(&y, &targets(&["A"])), targets(&["A"]));
    }

    #[test]
    fn stale_updates_are_ignored() {
        let matrix = CapabilityMatrix::new();
        let x = Credential::new("credential-x-000000");
        let early = Instant::now();
        let late = early + Duration::from_millis(5);

        assert!(matrix.record_at(&x, "A", Capability::Available, late));
        assert!(!matrix.record_at(&x, "A", Capability::Unavailable, early));
        assert_eq!(matrix.status(&x, "A"), Capability::Available);
    }

    #[test]
    fn summary_counts_entries() {
        let matrix = CapabilityMatrix::new();
        let x = Credential::new("credential-x-000000");
        matrix.record_available(&x, "A");
        matrix.record_unavailable(&x, "B");
        matrix.record_attempted(&x, "C");

        assert_eq!(
            matrix.summary(),
            MatrixSummary {
                available: 1,
                unknown: 1,
                unavailable: 1
            }
        );
    }
}
