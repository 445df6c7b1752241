//! Human-readable output.
//!
//! Plain text with optional ANSI color. Every renderer takes `no_color` and
//! produces identical text either way, minus the escape codes.

use std::fmt::Write;

use colored::{ColoredString, Colorize};

use crate::core::batch::{BatchReport, UnitResult, UnitStatus};
use crate::core::classifier::FailureCategory;
use crate::core::models::{Classification, ProviderKeys};

/// Apply a style unless colors are disabled.
fn paint(text: &str, no_color: bool, style: impl Fn(&str) -> ColoredString) -> String {
    if no_color {
        text.to_string()
    } else {
        style(text).to_string()
    }
}

fn status_marker(status: UnitStatus, no_color: bool) -> String {
    match status {
        UnitStatus::Generated => paint(if no_color { "[ok]" } else { "\u{2713}" }, no_color, |s| s.green()),
        UnitStatus::Skipped => paint(if no_color { "[--]" } else { "\u{23ED}" }, no_color, |s| s.bright_black()),
        UnitStatus::Failed => paint(if no_color { "[!!]" } else { "\u{2717}" }, no_color, |s| s.red()),
        UnitStatus::Cancelled => paint(if no_color { "[xx]" } else { "\u{25CC}" }, no_color, |s| s.yellow()),
    }
}

// =============================================================================
// Batch
// =============================================================================

/// Render a batch report.
#[must_use]
pub fn render_batch(report: &BatchReport, no_color: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {} unit(s), {} mode, {:.1}s",
        paint("Batch", no_color, |s| s.bold()),
        report.total(),
        report.mode.label(),
        millis_to_secs(report.duration_ms)
    );
    out.push('\n');

    for unit in &report.units {
        let _ = writeln!(out, "  {} {}", status_marker(unit.status, no_color), unit_line(unit));
        if let Some(error) = &unit.error {
            let _ = writeln!(out, "      {}", paint(error, no_color, |s| s.red()));
        }
    }

    if !report.providers.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "{}", paint("Providers", no_color, |s| s.bold()));
        for provider in &report.providers {
            let _ = writeln!(
                out,
                "  {:<16} {}  in_flight={}  targets: {} available, {} unknown, {} unavailable",
                provider.name,
                provider.pool,
                provider.pool.in_flight,
                provider.matrix.available,
                provider.matrix.unknown,
                provider.matrix.unavailable
            );
        }
    }

    out.push('\n');
    let summary = format!(
        "{} generated, {} skipped, {} failed, {} cancelled",
        report.succeeded, report.skipped, report.failed, report.cancelled
    );
    let _ = writeln!(
        out,
        "{}",
        if report.failed > 0 || report.cancelled > 0 {
            paint(&summary, no_color, |s| s.yellow())
        } else {
            paint(&summary, no_color, |s| s.green())
        }
    );
    out
}

fn unit_line(unit: &UnitResult) -> String {
    let mut line = format!("{:<24} {}", unit.id, unit.status.as_str());
    if let (Some(provider), Some(target)) = (&unit.provider, &unit.target) {
        let _ = write!(line, "  {provider}/{target}");
    }
    if let Some(fingerprint) = &unit.credential_fingerprint {
        let _ = write!(line, "  key {fingerprint}");
    }
    if let Some(path) = &unit.path {
        let _ = write!(line, "  -> {}", path.display());
    }
    if let Some(summary) = &unit.summary {
        if summary.invocations > 0 {
            let _ = write!(line, "  ({} call(s))", summary.invocations);
        }
    }
    line
}

#[allow(clippy::cast_precision_loss)]
fn millis_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

// =============================================================================
// Keys
// =============================================================================

/// Render loaded credentials per provider.
#[must_use]
pub fn render_keys(keys: &[ProviderKeys], no_color: bool) -> String {
    if keys.is_empty() {
        return "No providers configured.\n".to_string();
    }

    let mut out = String::new();
    for provider in keys {
        let count = if provider.count == 0 {
            paint("0 credentials", no_color, |s| s.red())
        } else {
            paint(&format!("{} credential(s)", provider.count), no_color, |s| s.green())
        };
        let _ = writeln!(
            out,
            "{}  {}  [{}]",
            paint(&provider.provider, no_color, |s| s.bold()),
            count,
            provider.source
        );
        if !provider.targets.is_empty() {
            let _ = writeln!(out, "  targets: {}", provider.targets.join(", "));
        }
        if let Some(error) = &provider.error {
            let _ = writeln!(out, "  {}", paint(error, no_color, |s| s.red()));
        }
        for (idx, key) in provider.keys.iter().enumerate() {
            let _ = writeln!(out, "  {:>3}. {}  {}", idx + 1, key.masked, key.fingerprint);
        }
        out.push('\n');
    }
    out
}

// =============================================================================
// Classification
// =============================================================================

/// Render a signal classification.
#[must_use]
pub fn render_classification(classification: &Classification, no_color: bool) -> String {
    let category = classification.category.as_str();
    let painted = match classification.category {
        FailureCategory::RateLimited | FailureCategory::Transient => {
            paint(category, no_color, |s| s.yellow())
        }
        FailureCategory::PermanentlyRejected | FailureCategory::ContentPolicyRejected => {
            paint(category, no_color, |s| s.red())
        }
        FailureCategory::TargetUnavailable => paint(category, no_color, |s| s.cyan()),
    };

    let mut out = String::new();
    let _ = writeln!(out, "Category: {painted}");
    if let Some(status) = classification.status {
        let _ = writeln!(out, "Status:   {status}");
    }
    if !classification.message.is_empty() {
        let _ = writeln!(out, "Message:  {}", classification.message);
    }
    let _ = writeln!(out, "Action:   {}", classification.action);
    out
}
