//! Robot-mode output (JSON and Markdown).
//!
//! Provides stable, token-efficient output for scripts and agents.

use std::fmt::Write;

use crate::core::batch::BatchReport;
use crate::core::models::{Classification, ProviderKeys, RobotOutput};
use crate::error::Result;

/// Render any serializable value as JSON.
pub fn render_json<T: serde::Serialize>(output: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(output)?)
    } else {
        Ok(serde_json::to_string(output)?)
    }
}

/// Render a batch report as JSON. Failed and cancelled units are listed in
/// `errors` as well as in the unit results.
pub fn render_batch_json(report: &BatchReport, pretty: bool) -> Result<String> {
    let errors = report
        .units
        .iter()
        .filter_map(|u| u.error.as_ref().map(|e| format!("{}: {e}", u.id)))
        .collect();
    render_json(&RobotOutput::with_errors("run", report, errors), pretty)
}

/// Render a batch report as Markdown.
#[must_use]
pub fn render_batch_md(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Batch ({})\n", report.mode.label());
    let _ = writeln!(out, "- units: {}", report.total());
    let _ = writeln!(out, "- generated: {}", report.succeeded);
    let _ = writeln!(out, "- skipped: {}", report.skipped);
    let _ = writeln!(out, "- failed: {}", report.failed);
    let _ = writeln!(out, "- cancelled: {}", report.cancelled);
    let _ = writeln!(out, "- duration_ms: {}\n", report.duration_ms);

    out.push_str("| unit | status | provider | target | calls | artifact |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for unit in &report.units {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            unit.id,
            unit.status.as_str(),
            unit.provider.as_deref().unwrap_or("-"),
            unit.target.as_deref().unwrap_or("-"),
            unit.summary.map_or(0, |s| s.invocations),
            unit.path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string())
        );
    }

    if !report.providers.is_empty() {
        out.push_str("\n### Providers\n");
        for provider in &report.providers {
            let _ = writeln!(
                out,
                "- {}: {} (targets available={} unknown={} unavailable={})",
                provider.name,
                provider.pool,
                provider.matrix.available,
                provider.matrix.unknown,
                provider.matrix.unavailable
            );
        }
    }
    out
}

/// Render key listings as JSON.
pub fn render_keys_json(keys: &[ProviderKeys], pretty: bool) -> Result<String> {
    let errors = keys
        .iter()
        .filter_map(|k| k.error.as_ref().map(|e| format!("{}: {e}", k.provider)))
        .collect();
    render_json(&RobotOutput::with_errors("keys", keys, errors), pretty)
}

/// Render key listings as Markdown.
#[must_use]
pub fn render_keys_md(keys: &[ProviderKeys]) -> String {
    let mut out = String::new();
    for provider in keys {
        let _ = writeln!(out, "## {} ({})", provider.provider, provider.source);
        let _ = writeln!(out, "- credentials: {}", provider.count);
        if !provider.targets.is_empty() {
            let _ = writeln!(out, "- targets: {}", provider.targets.join(", "));
        }
        if let Some(error) = &provider.error {
            let _ = writeln!(out, "- error: {error}");
        }
        for key in &provider.keys {
            let _ = writeln!(out, "- `{}` ({})", key.masked, key.fingerprint);
        }
        out.push('\n');
    }
    out
}

/// Render a classification as JSON.
pub fn render_classification_json(classification: &Classification, pretty: bool) -> Result<String> {
    render_json(&RobotOutput::new("classify", classification), pretty)
}

/// Render a classification as Markdown.
#[must_use]
pub fn render_classification_md(classification: &Classification) -> String {
    let mut out = String::from("## Classification\n");
    let _ = writeln!(out, "- category: {}", classification.category);
    if let Some(status) = classification.status {
        let _ = writeln!(out, "- status: {status}");
    }
    if !classification.message.is_empty() {
        let _ = writeln!(out, "- message: {}", classification.message);
    }
    let _ = writeln!(out, "- ends_turn: {}", classification.ends_turn);
    let _ = writeln!(out, "- action: {}", classification.action);
    out
}
