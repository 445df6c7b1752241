//! Test utilities for genpool.
//!
//! Provides a scripted [`Invoker`], credential and work-unit factories,
//! temporary directories and assertion macros for use across all test
//! modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use genpool::test_utils::*;
//!
//! let creds = test_credentials(3);
//! let invoker = ScriptedInvoker::succeeding()
//!     .script(&creds[0], "imagen-4", vec![Err(ErrorSignal::from_status(429))]);
//! let dir = TestDir::new();
//! dir.create_file("KeyKey1.txt", &creds[0].expose());
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::classifier::ErrorSignal;
use crate::core::credential::Credential;
use crate::core::invoker::Invoker;
use crate::core::work::{Generated, WorkUnit};

// =============================================================================
// Test Data Factories
// =============================================================================

/// Create `n` distinct credentials shaped like Gemini API keys.
///
/// ```rust,ignore
/// let creds = test_credentials(2);
/// assert_eq!(creds[0].expose().len(), 39);
/// ```
#[must_use]
pub fn test_credentials(n: usize) -> Vec<Credential> {
    (1..=n)
        .map(|i| Credential::new(format!("AIzaSyTest{i:02}{}", "x".repeat(27))))
        .collect()
}

/// Create a work unit with the given id and targets.
#[must_use]
pub fn make_test_work_unit(id: &str, targets: &[&str]) -> WorkUnit {
    WorkUnit::new(id, format!("prompt for {id}")).with_targets(targets.iter().copied())
}

/// Sample config TOML with one `key_in_query` provider and one
/// `bearer_json` fallback.
#[must_use]
pub fn make_test_config_toml(credentials_dir: &Path, endpoint: &str) -> String {
    format!(
        r#"[general]
cooldown_seconds = 1
max_attempts = 20
timeout_seconds = 5

[output]
format = "human"
color = false

[[providers]]
name = "gemini"
style = "key_in_query"
endpoint = "{endpoint}"
targets = ["imagen-4.0-generate-001", "imagen-3.0-generate-002"]

[providers.credentials]
type = "directory"
dir = "{dir}"

[[providers]]
name = "deepinfra"
style = "bearer_json"
endpoint = "{endpoint}"
targets = ["black-forest-labs/FLUX-1-schnell"]

[providers.credentials]
type = "env"
var = "GENPOOL_TEST_DEEPINFRA_KEY"
"#,
        dir = credentials_dir.display().to_string().replace('\\', "/"),
    )
}

// =============================================================================
// Scripted Invoker
// =============================================================================

type Scripted = Result<Generated, ErrorSignal>;

#[derive(Debug, Default)]
struct ScriptState {
    scripts: HashMap<(Credential, String), VecDeque<Scripted>>,
    target_defaults: HashMap<String, ErrorSignal>,
    delays: HashMap<Credential, Duration>,
    fallback: Option<ErrorSignal>,
    calls: Vec<(Credential, String)>,
}

/// Deterministic [`Invoker`] that replays scripted results per
/// (credential, target) pair.
///
/// Resolution order per call: the pair's script queue, then a per-target
/// failure, then the invoker-wide default (success unless built with
/// [`ScriptedInvoker::failing`]). Clones share state, so a clone handed to an
/// orchestrator can be inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInvoker {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedInvoker {
    /// Every unscripted call succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Every unscripted call fails with `signal`.
    #[must_use]
    pub fn failing(signal: ErrorSignal) -> Self {
        let invoker = Self::default();
        invoker.lock().fallback = Some(signal);
        invoker
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue results for one (credential, target) pair. Once the queue is
    /// empty the pair falls through to the defaults.
    #[must_use]
    pub fn script(self, credential: &Credential, target: &str, results: Vec<Scripted>) -> Self {
        self.lock()
            .scripts
            .entry((credential.clone(), target.to_string()))
            .or_default()
            .extend(results);
        self
    }

    /// Every unscripted call to `target` fails with `signal`.
    #[must_use]
    pub fn failing_target(self, target: &str, signal: ErrorSignal) -> Self {
        self.lock()
            .target_defaults
            .insert(target.to_string(), signal);
        self
    }

    /// Calls with `credential` sleep for `delay` before resolving.
    #[must_use]
    pub fn with_delay(self, credential: &Credential, delay: Duration) -> Self {
        self.lock().delays.insert(credential.clone(), delay);
        self
    }

    /// Total calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Calls made with `credential`.
    #[must_use]
    pub fn calls_for(&self, credential: &Credential) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(c, _)| c == credential)
            .count()
    }

    /// Every (credential, target) call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(Credential, String)> {
        self.lock().calls.clone()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(
        &self,
        credential: &Credential,
        target: &str,
        payload: &str,
    ) -> Result<Generated, ErrorSignal> {
        let delay = {
            let mut state = self.lock();
            state.calls.push((credential.clone(), target.to_string()));
            state.delays.get(credential).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(next) = state
            .scripts
            .get_mut(&(credential.clone(), target.to_string()))
            .and_then(VecDeque::pop_front)
        {
            return next;
        }
        if let Some(signal) = state.target_defaults.get(target) {
            return Err(signal.clone());
        }
        if let Some(signal) = &state.fallback {
            return Err(signal.clone());
        }
        drop(state);

        Ok(Generated::new(
            format!("{target}:{payload}").into_bytes(),
            "image/png",
        ))
    }
}

// =============================================================================
// Temp Directory Utilities
// =============================================================================

/// A temporary directory for tests with automatic cleanup.
///
/// Creates an isolated directory that is automatically deleted when
/// the `TestDir` is dropped. Uses the `tempfile` crate internally.
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Create a file in the temporary directory with the given content.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    /// Read a file from the temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_file(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.inner.path().join(name))
    }

    /// Check if a file exists in the temporary directory.
    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    /// Get the full path to a file in the temporary directory.
    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

// =============================================================================
// Test Helpers
// =============================================================================

/// Strip ANSI escape codes from a string.
#[must_use]
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&next) = chars.peek() {
                    chars.next();
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}
