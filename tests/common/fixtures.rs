//! Builders shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use genpool::core::credential::Credential;
use genpool::core::orchestrator::{GenerationOrchestrator, OrchestratorOptions};
use genpool::core::pool::{CredentialPool, PoolOptions};
use genpool::test_utils::ScriptedInvoker;

pub const PRIMARY_TARGET: &str = "imagen-4.0-generate-001";
pub const SECONDARY_TARGET: &str = "imagen-3.0-generate-002";

/// A pool that keeps input order, so tests can predict selection.
#[must_use]
pub fn ordered_pool(name: &str, credentials: &[Credential], cooldown: Duration) -> Arc<CredentialPool> {
    Arc::new(CredentialPool::new(
        name,
        credentials.to_vec(),
        &PoolOptions {
            cooldown,
            preserve_order: true,
        },
    ))
}

/// Orchestrator over an ordered pool with the given targets.
#[must_use]
pub fn orchestrator(
    provider: &str,
    credentials: &[Credential],
    invoker: &ScriptedInvoker,
    targets: &[&str],
    options: OrchestratorOptions,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        provider,
        ordered_pool(provider, credentials, Duration::from_secs(2)),
        Arc::new(invoker.clone()),
        targets.iter().map(ToString::to_string).collect(),
        options,
    )
}

#[must_use]
pub fn options(max_attempts: usize) -> OrchestratorOptions {
    OrchestratorOptions {
        max_attempts,
        wait_on_cooldown: false,
    }
}

/// Body of a successful `:predict` response.
#[must_use]
pub fn predict_success_body(image: &[u8]) -> serde_json::Value {
    use base64::Engine as _;
    serde_json::json!({
        "predictions": [{
            "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(image),
            "mimeType": "image/png"
        }]
    })
}

/// Body of a successful OpenAI-style images response.
#[must_use]
pub fn openai_success_body(image: &[u8]) -> serde_json::Value {
    use base64::Engine as _;
    serde_json::json!({
        "data": [{"b64_json": base64::engine::general_purpose::STANDARD.encode(image)}]
    })
}

/// Google-style error body.
#[must_use]
pub fn google_error_body(code: u16, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message, "status": "ERROR"}})
}
