//! Error rendering for genpool.
//!
//! Provides colored error rendering with fix suggestions for terminal output,
//! plain text for non-TTY environments, and structured JSON for robot mode.

use std::fmt::Write;

use colored::Colorize;

use crate::cli::args::OutputFormat;
use crate::error::{FixSuggestion, GenpoolError};

// =============================================================================
// Public API
// =============================================================================

/// Render an error with appropriate formatting based on terminal capabilities.
#[must_use]
pub fn render_error(error: &GenpoolError, format: OutputFormat, no_color: bool) -> String {
    render_error_full(error, format, no_color, false)
}

/// Render an error with full control over all formatting options.
///
/// JSON and Markdown formats get structured JSON; human format gets the
/// detailed colored layout only when stderr is a terminal and colors are on.
#[must_use]
pub fn render_error_full(
    error: &GenpoolError,
    format: OutputFormat,
    no_color: bool,
    pretty: bool,
) -> String {
    match format {
        OutputFormat::Json => return render_error_json(error, pretty),
        OutputFormat::Md => return render_error_json(error, true),
        OutputFormat::Human => {}
    }

    if !no_color && crate::util::env::stderr_is_tty() {
        render_detailed(error)
    } else {
        render_simple(error)
    }
}

/// Render error as structured JSON for machine consumption.
#[must_use]
pub fn render_error_json(error: &GenpoolError, pretty: bool) -> String {
    let error_json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&error_json)
    } else {
        serde_json::to_string(&error_json)
    };
    rendered.unwrap_or_else(|_| render_simple(error))
}

// =============================================================================
// Detailed Terminal Rendering
// =============================================================================

fn render_detailed(error: &GenpoolError) -> String {
    let suggestions = error.fix_suggestions();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {}",
        error.to_string().red().bold(),
        format!("[{}]", error.error_code()).bright_black()
    );
    let _ = writeln!(out, "{}", error.category().to_string().bright_black());

    if !suggestions.is_empty() {
        let _ = writeln!(out, "\n{}", "How to fix:".bold());
        out.push_str(&suggestion_lines(&suggestions, |cmd| cmd.cyan().to_string()));
    }

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            let _ = writeln!(out, "\n{}", "Why this happened:".bold());
            for line in wrap_text(&first.context, 68) {
                let _ = writeln!(out, "  {line}");
            }
        }
        if let Some(prevention) = &first.prevention {
            let _ = writeln!(out, "\n{}", "Prevention:".green().bold());
            for line in wrap_text(prevention, 68) {
                let _ = writeln!(out, "  {line}");
            }
        }
    }

    out.trim_end().to_string()
}

fn suggestion_lines(suggestions: &[FixSuggestion], style: impl Fn(&str) -> String) -> String {
    let mut out = String::new();
    for (i, suggestion) in suggestions.iter().enumerate() {
        for (j, cmd) in suggestion.commands.iter().enumerate() {
            let prefix = if j == 0 {
                format!("  {}. ", i + 1)
            } else {
                "     Or: ".to_string()
            };
            let _ = writeln!(out, "{prefix}{}", style(cmd));
        }
    }
    out
}

// =============================================================================
// Simple Text Rendering
// =============================================================================

/// Render error as simple text (no ANSI codes, no Unicode).
fn render_simple(error: &GenpoolError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];

    // First runnable command; comments are hints, not fixes.
    if let Some(cmd) = suggestions
        .first()
        .and_then(|s| s.commands.iter().find(|c| !c.starts_with('#')))
    {
        lines.push(format!("Fix: {cmd}"));
    }

    lines.join("\n")
}

// =============================================================================
// JSON Rendering
// =============================================================================

/// JSON representation of an error for machine consumption.
#[derive(serde::Serialize)]
struct ErrorJson {
    error_code: String,
    category: String,
    message: String,
    is_retryable: bool,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    suggestions: Vec<SuggestionJson>,
}

#[derive(serde::Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
}

impl ErrorJson {
    fn from_error(error: &GenpoolError) -> Self {
        Self {
            error_code: error.error_code().to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
            is_retryable: error.is_retryable(),
            exit_code: error.exit_code() as i32,
            provider: error.provider().map(String::from),
            suggestions: error
                .fix_suggestions()
                .into_iter()
                .map(|s| SuggestionJson {
                    commands: s.commands,
                    context: s.context,
                    prevention: s.prevention,
                })
                .collect(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Simple greedy word wrap.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}
