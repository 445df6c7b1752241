//! Shared helpers for integration tests.
//!
//! - `fixtures`: pools, orchestrators and config files built for tests
//! - `logger`: per-test structured logging
//! - `log_capture`: assertions over the crate's tracing events

pub mod fixtures;
pub mod log_capture;
pub mod logger;
