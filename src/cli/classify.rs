//! Classify command implementation.

use super::Display;
use crate::cli::args::ClassifyArgs;
use crate::core::classifier::ErrorSignal;
use crate::core::models::Classification;
use crate::error::Result;
use crate::render;

/// Build the signal described by the arguments.
#[must_use]
pub fn signal_from(args: &ClassifyArgs) -> ErrorSignal {
    let message = args.message.clone().unwrap_or_default();
    match args.status {
        Some(status) => ErrorSignal::new(status, message),
        None => ErrorSignal::from_message(message),
    }
}

/// Execute the classify command.
///
/// # Errors
///
/// Returns an error if neither `--status` nor `--message` is given.
pub fn execute(args: &ClassifyArgs, display: Display) -> Result<()> {
    args.validate()?;
    let classification = Classification::of(&signal_from(args));
    tracing::debug!(category = %classification.category, "Classified signal");

    let output = render::render_classification(
        &classification,
        display.format,
        display.pretty,
        display.no_color,
    )?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
