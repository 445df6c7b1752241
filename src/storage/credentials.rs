//! Credential sources.
//!
//! A provider's credentials come from one of:
//! - a directory of key files (`KeyKey*.txt` by default), scanned with a regex
//! - an environment variable holding one secret
//! - a file holding one secret
//! - an inline list in the config file
//!
//! Loaded credentials are de-duplicated while keeping first-seen order.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::credential::Credential;
use crate::error::{GenpoolError, Result};

/// Default file name glob for directory sources.
pub const DEFAULT_FILE_GLOB: &str = "KeyKey*.txt";
/// Default key shape for directory sources (Gemini API key).
pub const DEFAULT_KEY_PATTERN: &str = r"AIza[a-zA-Z0-9_-]{35}";
/// Single-secret sources must be longer than this.
const MIN_SECRET_LEN: usize = 10;

/// Where a provider's credentials come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    Directory {
        dir: PathBuf,
        #[serde(default = "default_file_glob")]
        file_glob: String,
        #[serde(default = "default_pattern")]
        pattern: String,
    },
    Env {
        var: String,
    },
    File {
        path: PathBuf,
    },
    Inline {
        keys: Vec<String>,
    },
}

fn default_file_glob() -> String {
    DEFAULT_FILE_GLOB.to_string()
}

fn default_pattern() -> String {
    DEFAULT_KEY_PATTERN.to_string()
}

impl CredentialSource {
    /// Directory source with the default glob and pattern.
    #[must_use]
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self::Directory {
            dir: dir.into(),
            file_glob: default_file_glob(),
            pattern: default_pattern(),
        }
    }

    /// Short description for logs and `keys` output. Never includes secrets.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Directory { dir, file_glob, .. } => {
                format!("directory {} ({file_glob})", dir.display())
            }
            Self::Env { var } => format!("env ${var}"),
            Self::File { path } => format!("file {}", path.display()),
            Self::Inline { keys } => format!("inline ({} entries)", keys.len()),
        }
    }

    /// Load credentials for `provider`.
    ///
    /// An empty result is not an error here; the caller decides whether a
    /// provider without credentials is fatal.
    ///
    /// # Errors
    ///
    /// Returns [`GenpoolError::CredentialSource`] if the source cannot be
    /// read or its pattern is invalid.
    pub fn load(&self, provider: &str) -> Result<Vec<Credential>> {
        let raw = match self {
            Self::Directory {
                dir,
                file_glob,
                pattern,
            } => load_directory(provider, dir, file_glob, pattern)?,
            Self::Env { var } => std::env::var(var)
                .ok()
                .into_iter()
                .filter(|v| is_usable_secret(v))
                .collect(),
            Self::File { path } => {
                let content = fs::read_to_string(path).map_err(|e| source_error(provider, path, &e))?;
                std::iter::once(content)
                    .filter(|v| is_usable_secret(v))
                    .collect()
            }
            Self::Inline { keys } => keys
                .iter()
                .filter(|k| !k.trim().is_empty())
                .cloned()
                .collect(),
        };

        let credentials = dedupe(raw);
        tracing::info!(
            provider = %provider,
            source = %self.describe(),
            count = credentials.len(),
            "Loaded credentials"
        );
        Ok(credentials)
    }
}

fn is_usable_secret(value: &str) -> bool {
    value.trim().len() > MIN_SECRET_LEN
}

fn source_error(provider: &str, path: &Path, err: &std::io::Error) -> GenpoolError {
    GenpoolError::CredentialSource {
        provider: provider.to_string(),
        reason: format!("{}: {err}", path.display()),
    }
}

fn load_directory(
    provider: &str,
    dir: &Path,
    file_glob: &str,
    pattern: &str,
) -> Result<Vec<String>> {
    let regex = Regex::new(pattern).map_err(|e| GenpoolError::CredentialSource {
        provider: provider.to_string(),
        reason: format!("invalid key pattern '{pattern}': {e}"),
    })?;
    let glob = Pattern::new(file_glob).map_err(|e| GenpoolError::CredentialSource {
        provider: provider.to_string(),
        reason: format!("invalid file glob '{file_glob}': {e}"),
    })?;

    let entries = fs::read_dir(dir).map_err(|e| source_error(provider, dir, &e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| glob.matches(name))
        })
        .collect();
    // read_dir order is platform dependent
    files.sort();

    let mut keys = Vec::new();
    for path in &files {
        match fs::read_to_string(path) {
            Ok(content) => {
                let before = keys.len();
                keys.extend(regex.find_iter(&content).map(|m| m.as_str().to_string()));
                tracing::debug!(
                    provider = %provider,
                    file = %path.display(),
                    found = keys.len() - before,
                    "Scanned key file"
                );
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "Skipping unreadable key file");
            }
        }
    }
    Ok(keys)
}

fn dedupe(raw: Vec<String>) -> Vec<Credential> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(Credential::new)
        .filter(|c| !c.expose().is_empty())
        .filter(|c| seen.insert(c.clone()))
        .collect()
}
