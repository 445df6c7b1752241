//! Credential pool with a three-state lifecycle.
//!
//! Every credential is in exactly one of `Alive`, `Waiting` (until its
//! `ready_at` instant) or `Dead`. Selection prefers the last credential that
//! succeeded, then walks the Alive list round-robin, then sweeps Waiting
//! credentials whose cooldown has elapsed. Dead is terminal for the run.
//!
//! All state lives behind one mutex so that moves between lists, cursor
//! advances and in-flight claims are atomic with respect to each other.
//!
//! Methods ending in `_at` take the current instant explicitly; the plain
//! variants use [`Instant::now`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Notify;

use super::classifier::FailureCategory;
use super::credential::Credential;

/// Cooldown applied to a rate-limited credential.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

// =============================================================================
// Public types
// =============================================================================

/// Lifecycle state of one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Alive,
    Waiting,
    Dead,
}

impl CredentialState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Waiting => "waiting",
            Self::Dead => "dead",
        }
    }
}

/// Outcome reported back to the pool after using a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureCategory),
}

impl From<FailureCategory> for Outcome {
    fn from(category: FailureCategory) -> Self {
        Self::Failure(category)
    }
}

/// A credential handed out by the pool, with the instant it was claimed.
///
/// The claim holds the credential out of selection until it is reported or
/// released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub credential: Credential,
    pub dispatched_at: Instant,
}

/// Point-in-time counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub alive: usize,
    pub waiting: usize,
    pub dead: usize,
    pub in_flight: usize,
}

impl PoolStatus {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.alive + self.waiting + self.dead
    }
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "alive={} waiting={} dead={}",
            self.alive, self.waiting, self.dead
        )
    }
}

/// Per-credential view for listings. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSnapshot {
    pub masked: String,
    pub fingerprint: String,
    pub state: CredentialState,
    pub last_successful: bool,
    pub in_flight: bool,
    /// Milliseconds until eligible again, for Waiting credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_in_ms: Option<u64>,
}

/// Options for building a pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub cooldown: Duration,
    /// Keep the input order instead of shuffling.
    pub preserve_order: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            preserve_order: false,
        }
    }
}

// =============================================================================
// Internal state
// =============================================================================

#[derive(Debug, Default)]
struct PoolState {
    alive: Vec<Credential>,
    waiting: Vec<(Credential, Instant)>,
    dead: Vec<Credential>,
    last_successful: Option<Credential>,
    /// Index into `alive` of the next round-robin pick.
    cursor: usize,
    /// Claimed credentials and the instant of their claim.
    in_flight: HashMap<Credential, Instant>,
    /// Dispatch instant of the last outcome applied per credential.
    applied: HashMap<Credential, Instant>,
    stale_reports: u64,
}

impl PoolState {
    fn eligible(&self, credential: &Credential, skip: &HashSet<Credential>) -> bool {
        !self.in_flight.contains_key(credential) && !skip.contains(credential)
    }

    fn state_of(&self, credential: &Credential) -> Option<CredentialState> {
        if self.alive.contains(credential) {
            Some(CredentialState::Alive)
        } else if self.waiting.iter().any(|(c, _)| c == credential) {
            Some(CredentialState::Waiting)
        } else if self.dead.contains(credential) {
            Some(CredentialState::Dead)
        } else {
            None
        }
    }

    fn remove_alive(&mut self, credential: &Credential) {
        if let Some(idx) = self.alive.iter().position(|c| c == credential) {
            self.alive.remove(idx);
            if idx < self.cursor {
                self.cursor -= 1;
            }
        }
    }

    fn remove_waiting(&mut self, credential: &Credential) {
        self.waiting.retain(|(c, _)| c != credential);
    }

    fn push_alive_front(&mut self, credential: Credential) {
        if !self.alive.is_empty() {
            self.cursor += 1;
        }
        self.alive.insert(0, credential);
    }

    /// Move every Waiting credential whose cooldown has elapsed to the back
    /// of the Alive list.
    fn sweep(&mut self, now: Instant) -> usize {
        let (ready, still_waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiting)
            .into_iter()
            .partition(|(_, ready_at)| now >= *ready_at);
        self.waiting = still_waiting;
        let count = ready.len();
        self.alive.extend(ready.into_iter().map(|(c, _)| c));
        count
    }

    fn claim(&mut self, credential: Credential, now: Instant) -> Claim {
        self.in_flight.insert(credential.clone(), now);
        Claim {
            credential,
            dispatched_at: now,
        }
    }
}

// =============================================================================
// Credential Pool
// =============================================================================

/// Owns the lifecycle of every credential for one provider.
#[derive(Debug)]
pub struct CredentialPool {
    name: String,
    cooldown: Duration,
    state: Mutex<PoolState>,
    released: Notify,
    /// Bumped by every release and report, before waiters are notified.
    releases: AtomicU64,
}

impl CredentialPool {
    /// Build a pool. Duplicates are dropped; all credentials start Alive.
    #[must_use]
    pub fn new(name: impl Into<String>, credentials: Vec<Credential>, options: &PoolOptions) -> Self {
        let mut seen = HashSet::new();
        let mut alive: Vec<Credential> = credentials
            .into_iter()
            .filter(|c| !c.expose().is_empty() && seen.insert(c.clone()))
            .collect();

        if !options.preserve_order {
            alive.shuffle(&mut rand::thread_rng());
        }

        let name = name.into();
        tracing::debug!(pool = %name, count = alive.len(), "Credential pool created");

        Self {
            name,
            cooldown: options.cooldown,
            state: Mutex::new(PoolState {
                alive,
                ..PoolState::default()
            }),
            released: Notify::new(),
            releases: AtomicU64::new(0),
        }
    }

    /// Build a pool with default cooldown, keeping input order.
    #[must_use]
    pub fn ordered(name: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self::new(
            name,
            credentials,
            &PoolOptions {
                preserve_order: true,
                ..PoolOptions::default()
            },
        )
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Claim the next credential, or `None` when nothing is selectable.
    pub fn next_credential(&self) -> Option<Claim> {
        self.next_credential_excluding_at(&HashSet::new(), Instant::now())
    }

    /// Like [`next_credential`](Self::next_credential), never returning a
    /// credential in `skip`.
    pub fn next_credential_excluding(&self, skip: &HashSet<Credential>) -> Option<Claim> {
        self.next_credential_excluding_at(skip, Instant::now())
    }

    pub fn next_credential_at(&self, now: Instant) -> Option<Claim> {
        self.next_credential_excluding_at(&HashSet::new(), now)
    }

    /// Selection order: the last successful credential if Alive, then the
    /// Alive list round-robin, then Waiting credentials whose `ready_at` has
    /// passed (moved to Alive first). Claimed and skipped credentials are
    /// never returned.
    pub fn next_credential_excluding_at(
        &self,
        skip: &HashSet<Credential>,
        now: Instant,
    ) -> Option<Claim> {
        let mut state = self.lock();

        if let Some(last) = state.last_successful.clone()
            && state.alive.contains(&last)
            && state.eligible(&last, skip)
        {
            return Some(state.claim(last, now));
        }

        let len = state.alive.len();
        for offset in 0..len {
            let idx = (state.cursor + offset) % len;
            let candidate = state.alive[idx].clone();
            if state.eligible(&candidate, skip) {
                state.cursor = (idx + 1) % len;
                return Some(state.claim(candidate, now));
            }
        }

        let swept = state.sweep(now);
        if swept > 0 {
            tracing::debug!(pool = %self.name, swept, "Cooldown elapsed, credentials back in rotation");
        }

        let found = state
            .alive
            .iter()
            .find(|c| state.eligible(c, skip))
            .cloned();
        found.map(|c| state.claim(c, now))
    }

    /// Drop a claim without changing the credential's state.
    pub fn release(&self, claim: &Claim) {
        let mut state = self.lock();
        Self::clear_claim(&mut state, claim);
        drop(state);
        self.signal_release();
    }

    fn signal_release(&self) {
        self.releases.fetch_add(1, Ordering::AcqRel);
        self.released.notify_waiters();
    }

    fn clear_claim(state: &mut PoolState, claim: &Claim) {
        if state.in_flight.get(&claim.credential) == Some(&claim.dispatched_at) {
            state.in_flight.remove(&claim.credential);
        }
    }

    /// Number of releases and reports so far. Read it before selecting and
    /// pass it to [`wait_for_release_since`](Self::wait_for_release_since).
    #[must_use]
    pub fn release_epoch(&self) -> u64 {
        self.releases.load(Ordering::Acquire)
    }

    /// Wait until some claim is reported or released, or `limit` elapses.
    pub async fn wait_for_release(&self, limit: Duration) {
        self.wait_for_release_since(self.release_epoch(), limit).await;
    }

    /// Wait for a release that happened after `epoch` was read, or `limit`.
    ///
    /// Returns at once if one already did.
    pub async fn wait_for_release_since(&self, epoch: u64, limit: Duration) {
        let released = async {
            loop {
                let notified = self.released.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.release_epoch() != epoch {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(limit, released).await;
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    /// Report an outcome for a claim and release it.
    ///
    /// Returns `false` when the outcome was stale: a fresher outcome for the
    /// same credential had already been applied.
    pub fn report_outcome(&self, claim: &Claim, outcome: Outcome) -> bool {
        self.report_outcome_at(claim, outcome, Instant::now())
    }

    pub fn report_outcome_at(&self, claim: &Claim, outcome: Outcome, now: Instant) -> bool {
        let mut state = self.lock();
        Self::clear_claim(&mut state, claim);
        let applied = self.apply(&mut state, &claim.credential, outcome, claim.dispatched_at, now);
        drop(state);
        self.signal_release();
        applied
    }

    fn apply(
        &self,
        state: &mut PoolState,
        credential: &Credential,
        outcome: Outcome,
        dispatched_at: Instant,
        now: Instant,
    ) -> bool {
        let changes_state = matches!(
            outcome,
            Outcome::Success
                | Outcome::Failure(
                    FailureCategory::RateLimited | FailureCategory::PermanentlyRejected
                )
        );
        if !changes_state {
            return true;
        }

        if state
            .applied
            .get(credential)
            .is_some_and(|last| *last > dispatched_at)
        {
            state.stale_reports += 1;
            tracing::debug!(
                pool = %self.name,
                credential = %credential.masked(),
                ?outcome,
                "Ignoring stale outcome"
            );
            return false;
        }

        let Some(current) = state.state_of(credential) else {
            tracing::warn!(
                pool = %self.name,
                credential = %credential.masked(),
                "Outcome reported for a credential this pool does not own"
            );
            return false;
        };

        if current == CredentialState::Dead {
            tracing::debug!(
                pool = %self.name,
                credential = %credential.masked(),
                ?outcome,
                "Credential is dead; outcome ignored"
            );
            return false;
        }

        state.applied.insert(credential.clone(), dispatched_at);

        match outcome {
            Outcome::Success => {
                state.remove_waiting(credential);
                state.remove_alive(credential);
                state.push_alive_front(credential.clone());
                state.last_successful = Some(credential.clone());
            }
            Outcome::Failure(FailureCategory::RateLimited) => {
                state.remove_alive(credential);
                state.remove_waiting(credential);
                state.waiting.push((credential.clone(), now + self.cooldown));
                tracing::info!(
                    pool = %self.name,
                    credential = %credential.masked(),
                    cooldown_ms = u64::try_from(self.cooldown.as_millis()).unwrap_or(u64::MAX),
                    "Credential rate limited, cooling down"
                );
            }
            Outcome::Failure(_) => {
                state.remove_alive(credential);
                state.remove_waiting(credential);
                state.dead.push(credential.clone());
                if state.last_successful.as_ref() == Some(credential) {
                    state.last_successful = None;
                }
                tracing::warn!(
                    pool = %self.name,
                    credential = %credential.masked(),
                    "Credential permanently rejected, removed for this run"
                );
            }
        }
        true
    }

    // -------------------------------------------------------------------------
    // Observability
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            alive: state.alive.len(),
            waiting: state.waiting.len(),
            dead: state.dead.len(),
            in_flight: state.in_flight.len(),
        }
    }

    #[must_use]
    pub fn state_of(&self, credential: &Credential) -> Option<CredentialState> {
        self.lock().state_of(credential)
    }

    /// `ready_at` of a Waiting credential.
    #[must_use]
    pub fn ready_at(&self, credential: &Credential) -> Option<Instant> {
        self.lock()
            .waiting
            .iter()
            .find(|(c, _)| c == credential)
            .map(|(_, at)| *at)
    }

    #[must_use]
    pub fn last_successful(&self) -> Option<Credential> {
        self.lock().last_successful.clone()
    }

    /// Time until the earliest Waiting credential becomes eligible.
    /// `Some(ZERO)` if one is already eligible, `None` if nothing is Waiting.
    #[must_use]
    pub fn next_ready_in(&self) -> Option<Duration> {
        self.next_ready_in_at(Instant::now())
    }

    #[must_use]
    pub fn next_ready_in_at(&self, now: Instant) -> Option<Duration> {
        self.lock()
            .waiting
            .iter()
            .map(|(_, at)| at.saturating_duration_since(now))
            .min()
    }

    /// Number of Alive credentials outside `skip` currently claimed by
    /// another caller.
    #[must_use]
    pub fn busy_excluding(&self, skip: &HashSet<Credential>) -> usize {
        let state = self.lock();
        state
            .alive
            .iter()
            .filter(|c| state.in_flight.contains_key(*c) && !skip.contains(*c))
            .count()
    }

    #[must_use]
    pub fn stale_reports(&self) -> u64 {
        self.lock().stale_reports
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<CredentialSnapshot> {
        self.snapshot_at(Instant::now())
    }

    #[must_use]
    pub fn snapshot_at(&self, now: Instant) -> Vec<CredentialSnapshot> {
        let state = self.lock();
        let entry = |c: &Credential, st: CredentialState, ready_at: Option<Instant>| {
            CredentialSnapshot {
                masked: c.masked(),
                fingerprint: c.fingerprint(),
                state: st,
                last_successful: state.last_successful.as_ref() == Some(c),
                in_flight: state.in_flight.contains_key(c),
                ready_in_ms: ready_at.map(|at| {
                    u64::try_from(at.saturating_duration_since(now).as_millis())
                        .unwrap_or(u64::MAX)
                }),
            }
        };

        let mut out = Vec::new();
        out.extend(
            state
                .alive
                .iter()
                .map(|c| entry(c, CredentialState::Alive, None)),
        );
        out.extend(
            state
                .waiting
                .iter()
                .map(|(c, at)| entry(c, CredentialState::Waiting, Some(*at))),
        );
        out.extend(
            state
                .dead
                .iter()
                .map(|c| entry(c, CredentialState::Dead, None)),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(n: usize) -> Vec<Credential> {
        (1..=n)
            .map(|i| Credential::new(format!("credential-number-{i:02}")))
            .collect()
    }

    fn pool(n: usize) -> (CredentialPool, Vec<Credential>) {
        let list = creds(n);
        (CredentialPool::ordered("test", list.clone()), list)
    }

    fn assert_exclusive(pool: &CredentialPool, all: &[Credential]) {
        let status = pool.status();
        assert_eq!(status.total(), all.len());
        for c in all {
            assert!(pool.state_of(c).is_some(), "{c:?} lost from bookkeeping");
        }
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut list = creds(2);
        list.push(list[0].clone());
        let pool = CredentialPool::ordered("dup", list);
        assert_eq!(pool.status().alive, 2);
    }

    #[test]
    fn shuffled_pool_keeps_every_credential() {
        let list = creds(10);
        let pool = CredentialPool::new("shuffled", list.clone(), &PoolOptions::default());
        assert_eq!(pool.status().alive, 10);
        assert_exclusive(&pool, &list);
    }

    #[test]
    fn round_robin_over_alive() {
        let (pool, list) = pool(3);
        let mut seen = Vec::new();
        for _ in 0..6 {
            let claim = pool.next_credential().unwrap();
            seen.push(claim.credential.clone());
            pool.release(&claim);
        }
        assert_eq!(
            seen,
            vec![
                list[0].clone(),
                list[1].clone(),
                list[2].clone(),
                list[0].clone(),
                list[1].clone(),
                list[2].clone()
            ]
        );
    }

    #[test]
    fn rate_limited_moves_to_waiting_and_next_is_second() {
        let (pool, list) = pool(3);
        let now = Instant::now();

        let first = pool.next_credential_at(now).unwrap();
        assert_eq!(first.credential, list[0]);
        assert!(pool.report_outcome_at(&first, FailureCategory::RateLimited.into(), now));

        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Waiting));
        assert_eq!(pool.ready_at(&list[0]), Some(now + DEFAULT_COOLDOWN));

        let next = pool.next_credential_at(now).unwrap();
        assert_eq!(next.credential, list[1]);
        assert_exclusive(&pool, &list);
    }

    #[test]
    fn permanent_rejection_is_terminal() {
        let (pool, list) = pool(1);
        let now = Instant::now();
        let claim = pool.next_credential_at(now).unwrap();
        pool.report_outcome_at(&claim, FailureCategory::PermanentlyRejected.into(), now);

        assert_eq!(
            pool.status(),
            PoolStatus {
                alive: 0,
                waiting: 0,
                dead: 1,
                in_flight: 0
            }
        );
        let much_later = now + Duration::from_secs(3600);
        assert!(pool.next_credential_at(much_later).is_none());
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Dead));
    }

    #[test]
    fn waiting_never_returned_before_ready_at() {
        let (pool, list) = pool(1);
        let now = Instant::now();
        let claim = pool.next_credential_at(now).unwrap();
        pool.report_outcome_at(&claim, FailureCategory::RateLimited.into(), now);

        assert!(pool.next_credential_at(now + Duration::from_millis(1999)).is_none());
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Waiting));

        let later = now + DEFAULT_COOLDOWN;
        let claim = pool.next_credential_at(later).unwrap();
        assert_eq!(claim.credential, list[0]);
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Alive));
    }

    #[test]
    fn affinity_to_last_successful() {
        let (pool, list) = pool(3);
        let now = Instant::now();

        let first = pool.next_credential_at(now).unwrap();
        pool.release(&first);
        let second = pool.next_credential_at(now).unwrap();
        assert_eq!(second.credential, list[1]);
        pool.report_outcome_at(&second, Outcome::Success, now);

        for _ in 0..3 {
            let claim = pool.next_credential_at(now).unwrap();
            assert_eq!(claim.credential, list[1]);
            pool.report_outcome_at(&claim, Outcome::Success, now);
        }
        assert_eq!(pool.last_successful(), Some(list[1].clone()));
    }

    #[test]
    fn success_revives_waiting_credential() {
        let (pool, list) = pool(2);
        let now = Instant::now();
        let claim = pool.next_credential_at(now).unwrap();
        pool.report_outcome_at(&claim, FailureCategory::RateLimited.into(), now);

        let later = Claim {
            credential: list[0].clone(),
            dispatched_at: now + Duration::from_millis(10),
        };
        pool.report_outcome_at(&later, Outcome::Success, now + Duration::from_millis(20));
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Alive));
        assert_eq!(pool.last_successful(), Some(list[0].clone()));
    }

    #[test]
    fn claimed_credentials_are_not_handed_out_twice() {
        let (pool, _) = pool(2);
        let a = pool.next_credential().unwrap();
        let b = pool.next_credential().unwrap();
        assert_ne!(a.credential, b.credential);
        assert!(pool.next_credential().is_none());
        assert_eq!(pool.status().in_flight, 2);

        pool.release(&a);
        assert_eq!(pool.next_credential().unwrap().credential, a.credential);
    }

    #[test]
    fn skip_set_is_honored() {
        let (pool, list) = pool(2);
        let skip: HashSet<_> = std::iter::once(list[0].clone()).collect();
        for _ in 0..3 {
            let claim = pool.next_credential_excluding(&skip).unwrap();
            assert_eq!(claim.credential, list[1]);
            pool.release(&claim);
        }
        let both: HashSet<_> = list.iter().cloned().collect();
        assert!(pool.next_credential_excluding(&both).is_none());
    }

    #[test]
    fn stale_outcome_does_not_overwrite_fresher_one() {
        let (pool, list) = pool(2);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(50);

        let early = Claim {
            credential: list[0].clone(),
            dispatched_at: t0,
        };
        let fresh = Claim {
            credential: list[0].clone(),
            dispatched_at: t1,
        };

        assert!(pool.report_outcome_at(&fresh, Outcome::Success, t1));
        assert!(!pool.report_outcome_at(&early, FailureCategory::RateLimited.into(), t1));
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Alive));
        assert_eq!(pool.stale_reports(), 1);
    }

    #[test]
    fn dead_ignores_late_success() {
        let (pool, list) = pool(1);
        let t0 = Instant::now();
        let claim = pool.next_credential_at(t0).unwrap();
        pool.report_outcome_at(&claim, FailureCategory::PermanentlyRejected.into(), t0);

        let late = Claim {
            credential: list[0].clone(),
            dispatched_at: t0 + Duration::from_millis(1),
        };
        assert!(!pool.report_outcome_at(&late, Outcome::Success, t0));
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Dead));
    }

    #[test]
    fn non_state_outcomes_only_release() {
        let (pool, list) = pool(1);
        let claim = pool.next_credential().unwrap();
        pool.report_outcome(&claim, FailureCategory::Transient.into());
        assert_eq!(pool.state_of(&list[0]), Some(CredentialState::Alive));
        assert_eq!(pool.status().in_flight, 0);
    }

    #[test]
    fn next_ready_in_reports_earliest() {
        let (pool, _) = pool(2);
        let now = Instant::now();
        assert_eq!(pool.next_ready_in_at(now), None);

        let a = pool.next_credential_at(now).unwrap();
        pool.report_outcome_at(&a, FailureCategory::RateLimited.into(), now);
        let b = pool.next_credential_at(now).unwrap();
        pool.report_outcome_at(
            &b,
            FailureCategory::RateLimited.into(),
            now + Duration::from_millis(500),
        );

        assert_eq!(
            pool.next_ready_in_at(now + Duration::from_millis(500)),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            pool.next_ready_in_at(now + Duration::from_secs(5)),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn snapshot_never_contains_secret() {
        let (pool, list) = pool(2);
        let claim = pool.next_credential().unwrap();
        pool.report_outcome(&claim, FailureCategory::RateLimited.into());

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 2);
        let json = serde_json::to_string(&snapshot).unwrap();
        for c in &list {
            assert!(!json.contains(c.expose()));
        }
        assert!(snapshot.iter().any(|s| s.state == CredentialState::Waiting));
    }

    #[test]
    fn concurrent_claims_are_distinct() {
        use std::sync::Arc;

        let pool = Arc::new(CredentialPool::ordered("race", creds(8)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.next_credential().map(|c| c.credential))
            })
            .collect();

        let claimed: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<_> = claimed.iter().cloned().collect();
        assert_eq!(claimed.len(), 8);
        assert_eq!(unique.len(), 8);
    }

    #[tokio::test]
    async fn release_before_waiting_is_not_lost() {
        let (pool, _) = pool(1);
        let claim = pool.next_credential().unwrap();
        let epoch = pool.release_epoch();

        // Lands after the failed selection but before the wait starts.
        pool.release(&claim);

        let started = Instant::now();
        pool.wait_for_release_since(epoch, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn report_wakes_a_registered_waiter() {
        use std::sync::Arc;

        let (pool, _) = pool(1);
        let pool = Arc::new(pool);
        let claim = pool.next_credential().unwrap();
        let epoch = pool.release_epoch();

        let reporter = Arc::clone(&pool);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            reporter.report_outcome(&claim, Outcome::Success);
        });

        let started = Instant::now();
        pool.wait_for_release_since(epoch, Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(pool.status().in_flight, 0);
    }

    #[tokio::test]
    async fn wait_without_release_times_out() {
        let (pool, _) = pool(1);
        let _claim = pool.next_credential().unwrap();
        let started = Instant::now();
        pool.wait_for_release_since(pool.release_epoch(), Duration::from_millis(30))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    mod logging {
        use super::*;
        use tracing_test::traced_test;

        #[traced_test]
        #[test]
        fn rate_limit_is_logged_masked() {
            let (pool, list) = pool(2);
            let claim = pool.next_credential().unwrap();
            pool.report_outcome(&claim, FailureCategory::RateLimited.into());

            assert!(logs_contain("Credential rate limited, cooling down"));
            assert!(logs_contain(&list[0].masked()));
            assert!(!logs_contain(list[0].expose()));
        }

        #[traced_test]
        #[test]
        fn stale_outcome_is_logged() {
            let (pool, list) = pool(1);
            let t0 = Instant::now();
            let early = Claim {
                credential: list[0].clone(),
                dispatched_at: t0,
            };
            let fresh = Claim {
                credential: list[0].clone(),
                dispatched_at: t0 + Duration::from_millis(5),
            };
            pool.report_outcome_at(&fresh, Outcome::Success, t0);
            pool.report_outcome_at(&early, FailureCategory::PermanentlyRejected.into(), t0);

            assert!(logs_contain("Ignoring stale outcome"));
        }
    }
}
