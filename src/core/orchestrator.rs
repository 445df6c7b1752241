//! Generation orchestrator.
//!
//! Drives one work unit against one provider: picks a credential from the
//! pool, orders the unit's targets through the capability matrix, invokes the
//! downstream call, classifies failures and feeds the result back into the
//! pool and the matrix. Returns an artifact or reports exhaustion.
//!
//! Two scheduling modes are supported:
//! - **Sequential**: one credential at a time ([`GenerationOrchestrator::attempt`]).
//! - **Racing**: up to `fan_out` credentials in flight for the same unit; the
//!   first success wins ([`GenerationOrchestrator::attempt_racing`]). Losing
//!   racers finish their current call and report it, but start no new call.
//!
//! Content-policy rejections are kept in a matrix scoped to the work unit:
//! they describe the payload, not the credential.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::capability::{Capability, CapabilityMatrix};
use super::classifier::FailureCategory;
use super::credential::Credential;
use super::invoker::Invoker;
use super::pool::{Claim, CredentialPool, Outcome};
use super::work::{Artifact, AttemptOutcome, AttemptSummary, GenerationOutcome, WorkUnit};

/// Default ceiling on credential selections per work unit.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

/// Default number of concurrent credentials in racing mode.
pub const DEFAULT_FAN_OUT: usize = 5;

// =============================================================================
// Options
// =============================================================================

/// How a work unit is scheduled against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SchedulingMode {
    #[default]
    Sequential,
    Racing { fan_out: usize },
}

impl SchedulingMode {
    #[must_use]
    pub fn from_arg(s: &str, fan_out: usize) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Some(Self::Sequential),
            "racing" | "race" => Some(Self::Racing {
                fan_out: fan_out.max(1),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Racing { .. } => "racing",
        }
    }
}

/// Tuning for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Ceiling on credential selections per unit.
    pub max_attempts: usize,
    /// Sleep until the earliest cooldown ends instead of giving up when only
    /// Waiting credentials remain.
    pub wait_on_cooldown: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_on_cooldown: false,
        }
    }
}

/// Callback invoked after every downstream call.
pub type AttemptObserver = Arc<dyn Fn(&str, &AttemptOutcome) + Send + Sync>;

// =============================================================================
// Shared state handed to racers
// =============================================================================

#[derive(Clone)]
struct Shared {
    provider: Arc<str>,
    pool: Arc<CredentialPool>,
    matrix: Arc<CapabilityMatrix>,
    invoker: Arc<dyn Invoker>,
    observer: Option<AttemptObserver>,
}

/// How one credential's turn ended.
enum TurnEnd {
    Generated(Artifact),
    /// Rate limited or rejected; already reported to the pool.
    CredentialRetired,
    /// Every ordered target failed without retiring the credential.
    TargetsExhausted,
    /// Cancelled before trying every target.
    Abandoned,
}

struct Turn {
    end: TurnEnd,
    summary: AttemptSummary,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs work units against one provider's pool.
pub struct GenerationOrchestrator {
    shared: Shared,
    default_targets: Vec<String>,
    options: OrchestratorOptions,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("provider", &self.shared.provider)
            .field("pool", &self.shared.pool.status())
            .field("default_targets", &self.default_targets)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl GenerationOrchestrator {
    /// Build an orchestrator with its own capability matrix.
    ///
    /// `default_targets` are used for work units that name no target.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        pool: Arc<CredentialPool>,
        invoker: Arc<dyn Invoker>,
        default_targets: Vec<String>,
        options: OrchestratorOptions,
    ) -> Self {
        let provider: String = provider.into();
        Self {
            shared: Shared {
                provider: Arc::from(provider),
                pool,
                matrix: Arc::new(CapabilityMatrix::new()),
                invoker,
                observer: None,
            },
            default_targets,
            options,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.shared.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        &self.shared.provider
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.shared.pool
    }

    #[must_use]
    pub fn matrix(&self) -> &Arc<CapabilityMatrix> {
        &self.shared.matrix
    }

    #[must_use]
    pub fn default_targets(&self) -> &[String] {
        &self.default_targets
    }

    #[must_use]
    pub const fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    fn targets_for(&self, unit: &WorkUnit) -> Vec<String> {
        if unit.targets.is_empty() {
            self.default_targets.clone()
        } else {
            unit.targets.clone()
        }
    }

    /// Run `unit` in sequential mode.
    pub async fn attempt(&self, unit: &WorkUnit) -> GenerationOutcome {
        self.attempt_with_cancel(unit, &CancellationToken::new()).await
    }

    /// Run `unit` in racing mode with up to `fan_out` concurrent credentials.
    pub async fn attempt_racing(&self, unit: &WorkUnit, fan_out: usize) -> GenerationOutcome {
        self.attempt_racing_with_cancel(unit, fan_out, &CancellationToken::new())
            .await
    }

    /// Run `unit` in the given mode. Once `cancel` fires no new downstream
    /// call is started; calls already in flight complete and are recorded.
    pub async fn run(
        &self,
        unit: &WorkUnit,
        mode: SchedulingMode,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        match mode {
            SchedulingMode::Sequential => self.attempt_with_cancel(unit, cancel).await,
            SchedulingMode::Racing { fan_out } => {
                self.attempt_racing_with_cancel(unit, fan_out, cancel).await
            }
        }
    }

    // -------------------------------------------------------------------------
    // Sequential mode
    // -------------------------------------------------------------------------

    async fn attempt_with_cancel(
        &self,
        unit: &WorkUnit,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let targets = self.targets_for(unit);
        let mut summary = AttemptSummary::default();
        if targets.is_empty() {
            tracing::warn!(provider = %self.provider(), unit = %unit.id, "No targets to try");
            return GenerationOutcome::Exhausted { summary };
        }

        let overlay = CapabilityMatrix::new();
        let mut skip = HashSet::new();
        let mut round = HashSet::new();

        while summary.selections < self.options.max_attempts && !cancel.is_cancelled() {
            let epoch = self.shared.pool.release_epoch();
            let Some((claim, ordered)) = self.select(&targets, &overlay, &mut skip, &mut round)
            else {
                if self.wait_for_credential(&skip, epoch, &mut summary).await {
                    continue;
                }
                break;
            };
            summary.selections += 1;

            let turn = run_turn(
                &self.shared,
                &unit.id,
                &claim,
                &ordered,
                &unit.payload,
                &overlay,
                cancel,
            )
            .await;
            summary.merge(&turn.summary);

            if let TurnEnd::Generated(artifact) = turn.end {
                return GenerationOutcome::Generated { artifact, summary };
            }
        }

        self.finish(unit, summary)
    }

    // -------------------------------------------------------------------------
    // Racing mode
    // -------------------------------------------------------------------------

    async fn attempt_racing_with_cancel(
        &self,
        unit: &WorkUnit,
        fan_out: usize,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let fan_out = fan_out.max(1);
        let targets = self.targets_for(unit);
        let mut summary = AttemptSummary::default();
        if targets.is_empty() {
            tracing::warn!(provider = %self.provider(), unit = %unit.id, "No targets to try");
            return GenerationOutcome::Exhausted { summary };
        }

        let overlay = Arc::new(CapabilityMatrix::new());
        let race = cancel.child_token();
        let mut skip = HashSet::new();
        let mut round = HashSet::new();
        let mut racers = FuturesUnordered::new();

        loop {
            let epoch = self.shared.pool.release_epoch();
            while racers.len() < fan_out
                && summary.selections < self.options.max_attempts
                && !race.is_cancelled()
            {
                let Some((claim, ordered)) = self.select(&targets, &overlay, &mut skip, &mut round)
                else {
                    break;
                };
                summary.selections += 1;

                let shared = self.shared.clone();
                let overlay = Arc::clone(&overlay);
                let token = race.clone();
                let unit_id = unit.id.clone();
                let payload = unit.payload.clone();
                racers.push(tokio::spawn(async move {
                    run_turn(
                        &shared, &unit_id, &claim, &ordered, &payload, &overlay, &token,
                    )
                    .await
                }));
            }

            if racers.is_empty() {
                if summary.selections < self.options.max_attempts
                    && !race.is_cancelled()
                    && self.wait_for_credential(&skip, epoch, &mut summary).await
                {
                    continue;
                }
                break;
            }

            let Some(joined) = racers.next().await else {
                break;
            };
            match joined {
                Ok(turn) => {
                    summary.merge(&turn.summary);
                    if let TurnEnd::Generated(artifact) = turn.end {
                        // Losers drain on their own tasks.
                        race.cancel();
                        tracing::debug!(
                            provider = %self.provider(),
                            unit = %unit.id,
                            in_flight = racers.len(),
                            "Race won, remaining attempts will drain"
                        );
                        return GenerationOutcome::Generated { artifact, summary };
                    }
                }
                Err(err) => {
                    tracing::error!(provider = %self.provider(), unit = %unit.id, error = %err, "Racer task failed");
                }
            }
        }

        self.finish(unit, summary)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Claim the next credential with something left to try.
    ///
    /// Credentials whose ordered target list is empty go into `skip` for the
    /// rest of the unit without consuming a slot. `round` holds credentials
    /// already used since the last pass over the pool, so a credential that
    /// only hit transient failures does not monopolize the unit.
    fn select(
        &self,
        targets: &[String],
        overlay: &CapabilityMatrix,
        skip: &mut HashSet<Credential>,
        round: &mut HashSet<Credential>,
    ) -> Option<(Claim, Vec<String>)> {
        let pool = &self.shared.pool;
        loop {
            let excluded: HashSet<Credential> = skip.union(round).cloned().collect();
            let Some(claim) = pool.next_credential_excluding(&excluded) else {
                if round.is_empty() {
                    return None;
                }
                round.clear();
                continue;
            };

            let ordered = overlay.ordered_targets(
                &claim.credential,
                &self.shared.matrix.ordered_targets(&claim.credential, targets),
            );
            if ordered.is_empty() {
                tracing::debug!(
                    provider = %self.provider(),
                    credential = %claim.credential.masked(),
                    "No targets left for credential, skipping"
                );
                skip.insert(claim.credential.clone());
                pool.release(&claim);
                continue;
            }

            round.insert(claim.credential.clone());
            return Some((claim, ordered));
        }
    }

    /// Decide whether to wait for a credential when selection came up empty.
    /// Consumes a ceiling slot when it waits. `epoch` is the pool's release
    /// epoch read before the failed selection.
    async fn wait_for_credential(
        &self,
        skip: &HashSet<Credential>,
        epoch: u64,
        summary: &mut AttemptSummary,
    ) -> bool {
        let pool = &self.shared.pool;
        let cooldown = pool.cooldown();

        if pool.busy_excluding(skip) > 0 {
            summary.selections += 1;
            pool.wait_for_release_since(epoch, cooldown).await;
            return true;
        }

        if self.options.wait_on_cooldown
            && let Some(ready_in) = pool.next_ready_in()
        {
            summary.selections += 1;
            let wait = ready_in.min(cooldown);
            tracing::info!(
                provider = %self.provider(),
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "All credentials cooling down, waiting"
            );
            tokio::time::sleep(wait).await;
            return true;
        }

        false
    }

    fn finish(&self, unit: &WorkUnit, summary: AttemptSummary) -> GenerationOutcome {
        let status = self.shared.pool.status();
        if summary.all_policy_rejections() {
            tracing::warn!(
                provider = %self.provider(),
                unit = %unit.id,
                invocations = summary.invocations,
                "Every attempt rejected by content policy"
            );
            GenerationOutcome::ExhaustedByPolicy { summary }
        } else {
            tracing::warn!(
                provider = %self.provider(),
                unit = %unit.id,
                invocations = summary.invocations,
                selections = summary.selections,
                pool = %status,
                "Work unit exhausted"
            );
            GenerationOutcome::Exhausted { summary }
        }
    }
}

// =============================================================================
// One credential's turn
// =============================================================================

/// Releases a claim on drop unless the turn reported an outcome for it.
/// Covers panicking invokers and futures dropped mid-call.
struct ClaimGuard<'a> {
    pool: &'a CredentialPool,
    claim: &'a Claim,
    settled: bool,
}

impl<'a> ClaimGuard<'a> {
    const fn new(pool: &'a CredentialPool, claim: &'a Claim) -> Self {
        Self {
            pool,
            claim,
            settled: false,
        }
    }

    fn report(mut self, outcome: Outcome) {
        self.settled = true;
        self.pool.report_outcome(self.claim, outcome);
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.pool.release(self.claim);
        }
    }
}

/// Try `ordered` targets with one claimed credential until one succeeds or
/// the credential is retired.
async fn run_turn(
    shared: &Shared,
    unit_id: &str,
    claim: &Claim,
    ordered: &[String],
    payload: &str,
    overlay: &CapabilityMatrix,
    cancel: &CancellationToken,
) -> Turn {
    let credential = &claim.credential;
    let guard = ClaimGuard::new(&shared.pool, claim);
    let mut summary = AttemptSummary::default();

    for target in ordered {
        if cancel.is_cancelled() {
            drop(guard);
            return Turn {
                end: TurnEnd::Abandoned,
                summary,
            };
        }

        shared.matrix.record_attempted(credential, target);
        let dispatched_at = Instant::now();
        let result = shared.invoker.invoke(credential, target, payload).await;
        let elapsed = dispatched_at.elapsed();
        summary.invocations += 1;
        let late = cancel.is_cancelled();

        match result {
            Ok(generated) => {
                let artifact =
                    Artifact::from_generated(generated, credential, target, &shared.provider);
                shared
                    .matrix
                    .record_at(credential, target, Capability::Available, dispatched_at);
                guard.report(Outcome::Success);
                tracing::info!(
                    provider = %shared.provider,
                    unit = %unit_id,
                    credential = %credential.masked(),
                    target = %target,
                    duration_ms = duration_ms(elapsed),
                    late,
                    "Generated"
                );

                let mut outcome = AttemptOutcome {
                    credential: credential.clone(),
                    target: target.clone(),
                    category: None,
                    artifact: Some(artifact),
                };
                notify(shared, unit_id, &outcome);
                let end = outcome
                    .artifact
                    .take()
                    .map_or(TurnEnd::TargetsExhausted, TurnEnd::Generated);
                return Turn { end, summary };
            }
            Err(signal) => {
                let category = signal.classify();
                summary.record(category);
                log_failure(shared, unit_id, credential, target, category, &signal, late);
                notify(
                    shared,
                    unit_id,
                    &AttemptOutcome {
                        credential: credential.clone(),
                        target: target.clone(),
                        category: Some(category),
                        artifact: None,
                    },
                );

                match category {
                    FailureCategory::RateLimited | FailureCategory::PermanentlyRejected => {
                        guard.report(category.into());
                        return Turn {
                            end: TurnEnd::CredentialRetired,
                            summary,
                        };
                    }
                    FailureCategory::TargetUnavailable => {
                        shared.matrix.record_at(
                            credential,
                            target,
                            Capability::Unavailable,
                            dispatched_at,
                        );
                    }
                    FailureCategory::ContentPolicyRejected => {
                        overlay.record_at(
                            credential,
                            target,
                            Capability::Unavailable,
                            dispatched_at,
                        );
                    }
                    FailureCategory::Transient => {}
                }
            }
        }
    }

    drop(guard);
    Turn {
        end: TurnEnd::TargetsExhausted,
        summary,
    }
}

fn notify(shared: &Shared, unit_id: &str, outcome: &AttemptOutcome) {
    if let Some(observer) = &shared.observer {
        observer(unit_id, outcome);
    }
}

fn log_failure(
    shared: &Shared,
    unit_id: &str,
    credential: &Credential,
    target: &str,
    category: FailureCategory,
    signal: &super::classifier::ErrorSignal,
    late: bool,
) {
    match category {
        FailureCategory::RateLimited | FailureCategory::Transient => tracing::info!(
            provider = %shared.provider,
            unit = %unit_id,
            credential = %credential.masked(),
            target = %target,
            category = %category,
            error = %signal,
            late,
            "Attempt failed"
        ),
        _ => tracing::warn!(
            provider = %shared.provider,
            unit = %unit_id,
            credential = %credential.masked(),
            target = %target,
            category = %category,
            error = %signal,
            late,
            "Attempt failed"
        ),
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
