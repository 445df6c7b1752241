//! HTTP client utilities.
//!
//! Provides the shared HTTP client used by every HTTP invoker.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::error::{GenpoolError, Result};

/// Longest error body kept in an error signal.
pub const MAX_ERROR_BODY: usize = 500;

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("genpool/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GenpoolError::Network(e.to_string()))
}

/// Extract a human-readable message from an error response body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"detail": ..}`; anything else is returned raw, truncated.
#[must_use]
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.pointer("/detail/error"),
            value.pointer("/detail/message"),
            value.get("detail"),
            value.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str() {
                return text.to_string();
            }
        }
    }
    truncate(body.trim(), MAX_ERROR_BODY)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}
