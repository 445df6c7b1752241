//! Provider registry and fallback controller.
//!
//! Each provider gets its own orchestrator, with an independent pool and
//! capability matrix. The controller runs a work unit on the primary and
//! walks the unit's alternate providers only while the previous provider
//! ended with every attempt rejected by content policy.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::capability::MatrixSummary;
use super::orchestrator::{GenerationOrchestrator, SchedulingMode};
use super::pool::PoolStatus;
use super::work::{AttemptSummary, GenerationOutcome, WorkUnit};
use crate::error::{GenpoolError, Result};

// =============================================================================
// Provider Registry
// =============================================================================

/// Named orchestrators, in registration order.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<GenerationOrchestrator>>,
    order: Vec<String>,
}

/// Observability snapshot for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    pub pool: PoolStatus,
    pub matrix: MatrixSummary,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an orchestrator under its provider name. A later registration
    /// with the same name replaces the earlier one.
    pub fn register(&mut self, orchestrator: GenerationOrchestrator) {
        let name = orchestrator.provider().to_string();
        if !self.providers.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.providers.insert(name, Arc::new(orchestrator));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<GenerationOrchestrator>> {
        self.providers.get(name)
    }

    /// Like [`get`](Self::get), as an error for unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`GenpoolError::UnknownProvider`] if `name` is not registered.
    pub fn require(&self, name: &str) -> Result<&Arc<GenerationOrchestrator>> {
        self.get(name)
            .ok_or_else(|| GenpoolError::UnknownProvider(name.to_string()))
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<ProviderSnapshot> {
        self.order
            .iter()
            .filter_map(|name| self.providers.get(name))
            .map(|orch| ProviderSnapshot {
                name: orch.provider().to_string(),
                pool: orch.pool().status(),
                matrix: orch.matrix().summary(),
            })
            .collect()
    }
}

// =============================================================================
// Fallback Controller
// =============================================================================

/// Runs a work unit on a primary provider with policy-driven fallback.
#[derive(Debug, Clone)]
pub struct ProviderFallbackController {
    registry: Arc<ProviderRegistry>,
    primary: String,
}

impl ProviderFallbackController {
    /// # Errors
    ///
    /// Returns [`GenpoolError::UnknownProvider`] if `primary` is not registered.
    pub fn new(registry: Arc<ProviderRegistry>, primary: impl Into<String>) -> Result<Self> {
        let primary = primary.into();
        registry.require(&primary)?;
        Ok(Self { registry, primary })
    }

    #[must_use]
    pub fn primary(&self) -> &str {
        &self.primary
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Run `unit` sequentially with fallback.
    pub async fn generate(&self, unit: &WorkUnit) -> GenerationOutcome {
        self.generate_with(unit, SchedulingMode::Sequential, &CancellationToken::new())
            .await
    }

    /// Run `unit` on the primary, then on each alternate in order while the
    /// previous provider ended in `ExhaustedByPolicy`. A success is returned
    /// unchanged; anything else ends as `Exhausted`.
    pub async fn generate_with(
        &self,
        unit: &WorkUnit,
        mode: SchedulingMode,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let mut total = AttemptSummary::default();

        let Some(primary) = self.registry.get(&self.primary) else {
            return GenerationOutcome::Exhausted { summary: total };
        };
        let mut outcome = primary.run(unit, mode, cancel).await;
        total.merge(outcome.summary());
        let mut previous = self.primary.as_str();

        for alternate in &unit.fallbacks {
            if !outcome.is_policy_exhausted() || cancel.is_cancelled() {
                break;
            }

            let Some(orchestrator) = self.registry.get(&alternate.provider) else {
                tracing::warn!(
                    unit = %unit.id,
                    provider = %alternate.provider,
                    "Unknown fallback provider, skipping"
                );
                continue;
            };

            tracing::info!(
                unit = %unit.id,
                from = %previous,
                to = %alternate.provider,
                "Content policy rejected on every attempt, falling back"
            );
            outcome = orchestrator
                .run(&unit.for_alternate(alternate), mode, cancel)
                .await;
            total.merge(outcome.summary());
            previous = &alternate.provider;
        }

        match outcome {
            GenerationOutcome::Generated { artifact, .. } => GenerationOutcome::Generated {
                artifact,
                summary: total,
            },
            _ => GenerationOutcome::Exhausted { summary: total },
        }
    }
}
