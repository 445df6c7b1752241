//! genpool - credential-pool failover and multi-provider generation.
//!
//! Runs batches of work units (prompts) against generation APIs through a
//! pool of interchangeable credentials per provider. Failures are classified
//! into rate limits, permanent rejections, unavailable targets, content-policy
//! rejections and transient errors; each category drives a different
//! recovery: cooldown, retirement, target demotion, or provider fallback.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod render;
pub mod storage;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, GenpoolError, Result};

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
