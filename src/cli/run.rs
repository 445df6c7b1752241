//! Run command implementation.
//!
//! Builds one orchestrator per configured provider, runs the batch through
//! the fallback controller, and renders the report. Ctrl-C stops new units
//! and new downstream calls; in-flight calls finish and are recorded.

use std::sync::Arc;

use super::Display;
use crate::cli::args::RunArgs;
use crate::core::batch::{BatchReport, BatchRunner, load_batch};
use crate::core::fallback::{ProviderFallbackController, ProviderRegistry};
use crate::core::invoker::HttpInvoker;
use crate::core::orchestrator::GenerationOrchestrator;
use crate::core::pool::CredentialPool;
use crate::core::work::WorkUnit;
use crate::error::{GenpoolError, Result};
use crate::render;
use crate::storage::{ArtifactSink, ProviderConfig, ResolvedConfig};

/// Build the orchestrator for one provider.
///
/// # Errors
///
/// Returns an error if the credential source fails, yields nothing, or the
/// HTTP client cannot be built.
pub fn build_orchestrator(
    provider: &ProviderConfig,
    config: &ResolvedConfig,
) -> Result<GenerationOrchestrator> {
    if provider.targets.is_empty() {
        return Err(GenpoolError::NoTargets(provider.name.clone()));
    }

    let credentials = provider.credentials.load(&provider.name)?;
    if credentials.is_empty() {
        return Err(GenpoolError::NoCredentials(provider.name.clone()));
    }

    let invoker = HttpInvoker::new(
        provider.style,
        provider.endpoint.as_deref(),
        provider.parameters.clone(),
        config.timeout,
    )?;
    let pool = CredentialPool::new(&provider.name, credentials, &config.pool_options());

    Ok(GenerationOrchestrator::new(
        &provider.name,
        Arc::new(pool),
        Arc::new(invoker),
        provider.targets.clone(),
        config.orchestrator_options(),
    ))
}

/// Build the registry of every usable provider.
///
/// The primary must be usable; other providers that fail to build are logged
/// and left out, so fallbacks to them are skipped.
///
/// # Errors
///
/// Returns an error if no primary is configured or the primary cannot be built.
pub fn build_registry(config: &ResolvedConfig) -> Result<(ProviderRegistry, String)> {
    let primary = config
        .primary
        .clone()
        .ok_or_else(|| GenpoolError::Config("no providers configured".to_string()))?;
    if config.provider(&primary).is_none() {
        return Err(GenpoolError::UnknownProvider(primary));
    }

    let mut registry = ProviderRegistry::new();
    for provider in &config.providers {
        match build_orchestrator(provider, config) {
            Ok(orchestrator) => registry.register(orchestrator),
            Err(err) if provider.name == primary => return Err(err),
            Err(err) => {
                tracing::warn!(
                    provider = %provider.name,
                    error = %err,
                    "Provider unavailable, fallbacks to it will be skipped"
                );
            }
        }
    }

    Ok((registry, primary))
}

/// Run `units` with the resolved configuration.
///
/// # Errors
///
/// Returns an error if the providers cannot be set up. Unit failures are
/// reported in the [`BatchReport`], not as errors.
pub async fn run_units(config: &ResolvedConfig, units: Vec<WorkUnit>) -> Result<BatchReport> {
    let (registry, primary) = build_registry(config)?;
    let controller = ProviderFallbackController::new(Arc::new(registry), primary)?;
    let runner = BatchRunner::new(
        controller,
        ArtifactSink::new(&config.artifact_dir),
        config.batch_options(),
    );

    let token = runner.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight calls");
            token.cancel();
        }
    });

    let report = runner.run(units).await;
    interrupt.abort();
    Ok(report)
}

/// Execute the run command.
///
/// # Errors
///
/// Returns a setup error, or the batch-level error when units failed or the
/// batch was cancelled (after the report is printed).
pub async fn execute(args: &RunArgs, config: &ResolvedConfig, display: Display) -> Result<()> {
    let units = load_batch(&args.batch)?;
    tracing::debug!(
        units = units.len(),
        artifact_dir = %config.artifact_dir.display(),
        "Loaded batch"
    );

    let report = run_units(config, units).await?;
    let output = render::render_batch(&report, display.format, display.pretty, display.no_color)?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }

    report.error().map_or(Ok(()), Err)
}
