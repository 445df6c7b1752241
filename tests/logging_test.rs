//! Structured log events emitted while orchestrating.
//!
//! Events carry masked credentials and stable category labels; the raw
//! secret never reaches a log line.

mod common;

use genpool::core::classifier::ErrorSignal;
use genpool::core::logging::{LogFormat, LogLevel, LogSettings};
use genpool::test_utils::{ScriptedInvoker, make_test_work_unit, test_credentials};

use common::fixtures::{PRIMARY_TARGET, options, orchestrator};
use common::logger::TestLogger;

#[tokio::test]
async fn attempt_events_are_masked_and_labelled() {
    let (log, capture) = TestLogger::with_capture("attempt_events_are_masked_and_labelled");
    let creds = test_credentials(2);
    let invoker = ScriptedInvoker::succeeding().script(
        &creds[0],
        PRIMARY_TARGET,
        vec![Err(ErrorSignal::new(429, "Too Many Requests"))],
    );
    let orch = orchestrator("gemini", &creds, &invoker, &[PRIMARY_TARGET], options(10));

    log.phase("execute");
    let outcome = orch.attempt(&make_test_work_unit("scene-01", &[])).await;
    assert!(outcome.is_generated());

    log.phase("verify");
    capture.assert_logged_at_level(tracing::Level::INFO, "Attempt failed");
    capture.assert_logged_at_level(tracing::Level::INFO, "Credential rate limited, cooling down");
    capture.assert_logged_at_level(tracing::Level::INFO, "Generated");
    capture.assert_field_logged("category", "rate_limited");
    capture.assert_field_logged("credential", &creds[0].masked());
    capture.assert_field_logged("unit", "scene-01");
    for cred in &creds {
        capture.assert_not_leaked(cred.expose());
    }
    capture.assert_no_errors();
    log.finish_ok();
}

#[tokio::test]
async fn permanent_rejection_is_a_warning() {
    let (log, capture) = TestLogger::with_capture("permanent_rejection_is_a_warning");
    let creds = test_credentials(1);
    let invoker = ScriptedInvoker::failing(ErrorSignal::new(400, "API key not valid. Please pass a valid API key."));
    let orch = orchestrator("gemini", &creds, &invoker, &[PRIMARY_TARGET], options(10));

    let outcome = orch.attempt(&make_test_work_unit("scene-02", &[])).await;

    assert_eq!(outcome.label(), "exhausted");
    capture.assert_logged_at_level(
        tracing::Level::WARN,
        "Credential permanently rejected, removed for this run",
    );
    capture.assert_logged_at_level(tracing::Level::WARN, "Work unit exhausted");
    capture.assert_not_leaked(creds[0].expose());
    log.finish_ok();
}

#[test]
fn log_settings_follow_flags_then_env() {
    let log = TestLogger::new("log_settings_follow_flags_then_env");
    let env = |key: &str| match key {
        "GENPOOL_LOG" => Some("warn".to_string()),
        "GENPOOL_LOG_FORMAT" => Some("compact".to_string()),
        _ => None,
    };

    let from_env = LogSettings::resolve(None, false, false, &env);
    assert_eq!(from_env.level, LogLevel::Warn);
    assert_eq!(from_env.format, LogFormat::Compact);

    let from_flags = LogSettings::resolve(Some("trace"), true, false, &env);
    assert_eq!(from_flags.level, LogLevel::Trace);
    assert_eq!(from_flags.format, LogFormat::Json);

    let verbose = LogSettings::resolve(None, false, true, &env);
    assert_eq!(verbose.level, LogLevel::Debug);
    log.finish_ok();
}
