//! Output rendering for human and robot modes.

pub mod error;
pub mod human;
pub mod robot;

use crate::cli::args::OutputFormat;
use crate::core::batch::BatchReport;
use crate::core::models::{Classification, ProviderKeys};
use crate::error::Result;

/// Render a batch report.
pub fn render_batch(
    report: &BatchReport,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_batch(report, no_color)),
        OutputFormat::Json => robot::render_batch_json(report, pretty),
        OutputFormat::Md => Ok(robot::render_batch_md(report)),
    }
}

/// Render loaded credentials per provider.
pub fn render_keys(
    keys: &[ProviderKeys],
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_keys(keys, no_color)),
        OutputFormat::Json => robot::render_keys_json(keys, pretty),
        OutputFormat::Md => Ok(robot::render_keys_md(keys)),
    }
}

/// Render a signal classification.
pub fn render_classification(
    classification: &Classification,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Human => Ok(human::render_classification(classification, no_color)),
        OutputFormat::Json => robot::render_classification_json(classification, pretty),
        OutputFormat::Md => Ok(robot::render_classification_md(classification)),
    }
}
