//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/genpool/config.toml`
//! - macOS: `~/Library/Application Support/dev.genpool.genpool/config.toml`
//! - Windows: `%APPDATA%/genpool/genpool/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `GENPOOL_CONFIG`: Override config file path
//! - `GENPOOL_COOLDOWN`: Rate-limit cooldown in seconds
//! - `GENPOOL_MAX_ATTEMPTS`: Credential selections per work unit
//! - `GENPOOL_TIMEOUT`: Request timeout in seconds
//! - `GENPOOL_FORMAT`: Output format (human, json, md)
//! - `GENPOOL_NO_COLOR` or `NO_COLOR`: Disable colors (1, true, yes)
//! - `GENPOOL_PRETTY`: Pretty-print JSON output (1, true, yes)
//! - `GENPOOL_ARTIFACT_DIR`: Artifact output directory
//!
//! ## Example
//!
//! ```toml
//! [general]
//! cooldown_seconds = 2
//! max_attempts = 100
//! scheduling = "racing"
//! fan_out = 5
//!
//! [[providers]]
//! name = "gemini"
//! style = "key_in_query"
//! targets = ["imagen-4.0-generate-001", "imagen-3.0-generate-002"]
//!
//! [providers.credentials]
//! type = "directory"
//! dir = "/home/me/keys"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AppPaths;
use super::credentials::CredentialSource;
use crate::cli::args::{Cli, OutputFormat, RunArgs};
use crate::core::batch::BatchOptions;
use crate::core::invoker::RequestStyle;
use crate::core::orchestrator::{
    DEFAULT_FAN_OUT, DEFAULT_MAX_ATTEMPTS, OrchestratorOptions, SchedulingMode,
};
use crate::core::pool::{DEFAULT_COOLDOWN, PoolOptions};
use crate::error::{GenpoolError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "GENPOOL_CONFIG";
/// Environment variable for the rate-limit cooldown in seconds.
pub const ENV_COOLDOWN: &str = "GENPOOL_COOLDOWN";
/// Environment variable for the per-unit selection ceiling.
pub const ENV_MAX_ATTEMPTS: &str = "GENPOOL_MAX_ATTEMPTS";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "GENPOOL_TIMEOUT";
/// Environment variable for output format.
pub const ENV_FORMAT: &str = "GENPOOL_FORMAT";
/// Environment variable to disable colors.
pub const ENV_NO_COLOR: &str = "GENPOOL_NO_COLOR";
/// Standard environment variable to disable colors.
pub const ENV_NO_COLOR_STD: &str = "NO_COLOR";
/// Environment variable for pretty JSON output.
pub const ENV_PRETTY: &str = "GENPOOL_PRETTY";
/// Environment variable for the artifact directory.
pub const ENV_ARTIFACT_DIR: &str = "GENPOOL_ARTIFACT_DIR";

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const MAX_TIMEOUT_SECONDS: u64 = 600;
const MAX_COOLDOWN_SECONDS: f64 = 3600.0;
const MAX_ATTEMPTS_LIMIT: usize = 10_000;
const MAX_PARALLEL_UNITS: usize = 64;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Output format.
    pub format: OutputFormat,
    /// Whether to disable colored output.
    pub no_color: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
    /// Cooldown after a rate limit.
    pub cooldown: Duration,
    /// Ceiling on credential selections per unit.
    pub max_attempts: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Scheduling mode for every unit.
    pub scheduling: SchedulingMode,
    /// Units in progress at once.
    pub max_parallel_units: usize,
    /// Sleep through cooldowns instead of exhausting.
    pub wait_on_cooldown: bool,
    /// Where artifacts are written.
    pub artifact_dir: PathBuf,
    /// Primary provider name.
    pub primary: Option<String>,
    /// Configured providers in file order.
    pub providers: Vec<ProviderConfig>,
    /// Config file the values were read from.
    pub config_path: PathBuf,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub format: ConfigSource,
    pub no_color: ConfigSource,
    pub pretty: ConfigSource,
    pub cooldown: ConfigSource,
    pub max_attempts: ConfigSource,
    pub timeout: ConfigSource,
    pub scheduling: ConfigSource,
    pub artifact_dir: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and
    /// the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or any
    /// resolved value is out of bounds.
    pub fn resolve(cli: &Cli, run: Option<&RunArgs>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let config_path = cli
            .config
            .clone()
            .or_else(|| env(ENV_CONFIG).map(PathBuf::from))
            .unwrap_or_else(Config::config_path);
        let config = Config::load_from(&config_path)?;
        let mut resolved = Self::resolve_with(cli, run, &config, &env)?;
        resolved.config_path = config_path;
        Ok(resolved)
    }

    /// Resolve against an already-loaded config and an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or any resolved value is invalid.
    pub fn resolve_with(
        cli: &Cli,
        run: Option<&RunArgs>,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        config.validate()?;
        let mut sources = ConfigSources::default();

        let format = Self::resolve_format(cli, config, env, &mut sources.format)?;
        let no_color = Self::resolve_no_color(cli, config, env, &mut sources.no_color);
        let pretty = Self::resolve_pretty(cli, config, env, &mut sources.pretty);
        let cooldown = Self::resolve_cooldown(run, config, env, &mut sources.cooldown)?;
        let max_attempts = Self::resolve_max_attempts(run, config, env, &mut sources.max_attempts)?;
        let timeout = Self::resolve_timeout(run, config, env, &mut sources.timeout)?;
        let scheduling = Self::resolve_scheduling(run, config, &mut sources.scheduling)?;
        let artifact_dir = Self::resolve_artifact_dir(run, config, env, &mut sources.artifact_dir);

        let max_parallel_units = run
            .and_then(|r| r.parallel)
            .unwrap_or(config.general.max_parallel_units);
        if max_parallel_units == 0 || max_parallel_units > MAX_PARALLEL_UNITS {
            return Err(GenpoolError::ConfigInvalid {
                key: "max_parallel_units".to_string(),
                value: max_parallel_units.to_string(),
                message: format!("must be between 1 and {MAX_PARALLEL_UNITS}"),
            });
        }

        let primary = run
            .and_then(|r| r.provider.clone())
            .or_else(|| config.providers.first().map(|p| p.name.clone()));

        Ok(Self {
            format,
            no_color,
            pretty,
            cooldown,
            max_attempts,
            timeout,
            scheduling,
            max_parallel_units,
            wait_on_cooldown: run.is_some_and(|r| r.wait_on_cooldown)
                || config.general.wait_on_cooldown,
            artifact_dir,
            primary,
            providers: config.providers.clone(),
            config_path: Config::config_path(),
            sources,
        })
    }

    fn resolve_format(
        cli: &Cli,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<OutputFormat> {
        // 1. CLI --json flag (shorthand)
        if cli.json {
            *source = ConfigSource::Cli;
            return Ok(OutputFormat::Json);
        }

        // 2. Environment variable. clap fills in "human" when --format is
        // absent, so only a non-default CLI value can outrank the env.
        if let Some(format_env) = env(ENV_FORMAT) {
            *source = ConfigSource::Env;
            return Self::parse_format(&format_env);
        }

        if cli.format != OutputFormat::Human {
            *source = ConfigSource::Cli;
            return Ok(cli.format);
        }

        // 3. Config file
        if let Some(ref format_str) = config.output.format {
            *source = ConfigSource::ConfigFile;
            return Self::parse_format(format_str);
        }

        // 4. Default
        *source = ConfigSource::Default;
        Ok(OutputFormat::Human)
    }

    /// Parse a format string into `OutputFormat`.
    fn parse_format(s: &str) -> Result<OutputFormat> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Md),
            _ => Err(GenpoolError::ConfigInvalid {
                key: "format".to_string(),
                value: s.to_string(),
                message: "valid formats: human, json, md".to_string(),
            }),
        }
    }

    fn resolve_no_color(
        cli: &Cli,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> bool {
        if cli.no_color {
            *source = ConfigSource::Cli;
            return true;
        }

        if is_truthy(env(ENV_NO_COLOR).as_deref()) || env(ENV_NO_COLOR_STD).is_some() {
            *source = ConfigSource::Env;
            return true;
        }

        // config.output.color = false means no_color = true
        if !config.output.color {
            *source = ConfigSource::ConfigFile;
            return true;
        }

        *source = ConfigSource::Default;
        false
    }

    fn resolve_pretty(
        cli: &Cli,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> bool {
        if cli.pretty {
            *source = ConfigSource::Cli;
            return true;
        }

        if is_truthy(env(ENV_PRETTY).as_deref()) {
            *source = ConfigSource::Env;
            return true;
        }

        if config.output.pretty {
            *source = ConfigSource::ConfigFile;
            return true;
        }

        *source = ConfigSource::Default;
        false
    }

    fn resolve_cooldown(
        run: Option<&RunArgs>,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<Duration> {
        let (seconds, from) = if let Some(secs) = run.and_then(|r| r.cooldown) {
            (secs, ConfigSource::Cli)
        } else if let Some(raw) = env(ENV_COOLDOWN) {
            (parse_env(ENV_COOLDOWN, &raw)?, ConfigSource::Env)
        } else if config.general.cooldown_seconds.is_some() {
            (config.general.effective_cooldown(), ConfigSource::ConfigFile)
        } else {
            (DEFAULT_COOLDOWN.as_secs_f64(), ConfigSource::Default)
        };
        check_cooldown(seconds)?;
        *source = from;
        Ok(Duration::from_secs_f64(seconds))
    }

    fn resolve_max_attempts(
        run: Option<&RunArgs>,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<usize> {
        let (value, from) = if let Some(n) = run.and_then(|r| r.max_attempts) {
            (n, ConfigSource::Cli)
        } else if let Some(raw) = env(ENV_MAX_ATTEMPTS) {
            (parse_env(ENV_MAX_ATTEMPTS, &raw)?, ConfigSource::Env)
        } else {
            (config.general.max_attempts, ConfigSource::ConfigFile)
        };
        check_max_attempts(value)?;
        *source = from;
        Ok(value)
    }

    fn resolve_timeout(
        run: Option<&RunArgs>,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Result<Duration> {
        let (seconds, from) = if let Some(secs) = run.and_then(|r| r.timeout) {
            (secs, ConfigSource::Cli)
        } else if let Some(raw) = env(ENV_TIMEOUT) {
            (parse_env(ENV_TIMEOUT, &raw)?, ConfigSource::Env)
        } else {
            (config.general.timeout_seconds, ConfigSource::ConfigFile)
        };
        check_timeout(seconds)?;
        *source = from;
        Ok(Duration::from_secs(seconds))
    }

    fn resolve_scheduling(
        run: Option<&RunArgs>,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<SchedulingMode> {
        if let Some(args) = run.filter(|r| r.racing) {
            *source = ConfigSource::Cli;
            return Ok(SchedulingMode::Racing {
                fan_out: args.fan_out.unwrap_or(config.general.fan_out).max(1),
            });
        }

        *source = ConfigSource::ConfigFile;
        config.general.scheduling_mode()
    }

    fn resolve_artifact_dir(
        run: Option<&RunArgs>,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> PathBuf {
        if let Some(dir) = run.and_then(|r| r.out.clone()) {
            *source = ConfigSource::Cli;
            return dir;
        }

        if let Some(dir) = env(ENV_ARTIFACT_DIR) {
            *source = ConfigSource::Env;
            return PathBuf::from(dir);
        }

        if let Some(dir) = config.output.artifact_dir.clone() {
            *source = ConfigSource::ConfigFile;
            return dir;
        }

        *source = ConfigSource::Default;
        AppPaths::new().artifacts_dir()
    }

    /// Provider entry by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            cooldown: self.cooldown,
            ..PoolOptions::default()
        }
    }

    #[must_use]
    pub const fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            max_attempts: self.max_attempts,
            wait_on_cooldown: self.wait_on_cooldown,
        }
    }

    #[must_use]
    pub const fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            mode: self.scheduling,
            max_parallel_units: self.max_parallel_units,
        }
    }
}

/// Check if an environment value is truthy.
fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| GenpoolError::ConfigInvalid {
        key: key.to_string(),
        value: raw.to_string(),
        message: "not a valid number".to_string(),
    })
}

fn check_cooldown(seconds: f64) -> Result<()> {
    if !seconds.is_finite() || !(0.0..=MAX_COOLDOWN_SECONDS).contains(&seconds) {
        return Err(GenpoolError::ConfigInvalid {
            key: "cooldown_seconds".to_string(),
            value: seconds.to_string(),
            message: format!("must be between 0 and {MAX_COOLDOWN_SECONDS} seconds"),
        });
    }
    Ok(())
}

fn check_max_attempts(value: usize) -> Result<()> {
    if value == 0 || value > MAX_ATTEMPTS_LIMIT {
        return Err(GenpoolError::ConfigInvalid {
            key: "max_attempts".to_string(),
            value: value.to_string(),
            message: format!("must be between 1 and {MAX_ATTEMPTS_LIMIT}"),
        });
    }
    Ok(())
}

fn check_timeout(seconds: u64) -> Result<()> {
    if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
        return Err(GenpoolError::ConfigInvalid {
            key: "timeout_seconds".to_string(),
            value: seconds.to_string(),
            message: format!("must be between 1 and {MAX_TIMEOUT_SECONDS} seconds"),
        });
    }
    Ok(())
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Output settings.
    pub output: OutputConfig,
    /// Providers in priority order; the first is the default primary.
    pub providers: Vec<ProviderConfig>,
}

/// General orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Cooldown after a rate limit, in seconds.
    pub cooldown_seconds: Option<f64>,
    /// Ceiling on credential selections per unit.
    pub max_attempts: usize,
    /// Timeout for downstream calls in seconds.
    pub timeout_seconds: u64,
    /// `sequential` or `racing`.
    pub scheduling: String,
    /// Concurrent credentials per unit in racing mode.
    pub fan_out: usize,
    /// Units in progress at once.
    pub max_parallel_units: usize,
    /// Sleep through cooldowns instead of exhausting.
    pub wait_on_cooldown: bool,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

impl GeneralConfig {
    fn effective_cooldown(&self) -> f64 {
        self.cooldown_seconds
            .unwrap_or_else(|| DEFAULT_COOLDOWN.as_secs_f64())
    }

    fn scheduling_mode(&self) -> Result<SchedulingMode> {
        SchedulingMode::from_arg(&self.scheduling, self.fan_out).ok_or_else(|| {
            GenpoolError::ConfigInvalid {
                key: "scheduling".to_string(),
                value: self.scheduling.clone(),
                message: "valid modes: sequential, racing".to_string(),
            }
        })
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            scheduling: "sequential".to_string(),
            fan_out: DEFAULT_FAN_OUT,
            max_parallel_units: 1,
            wait_on_cooldown: false,
            log_level: None,
        }
    }
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (human, json, md).
    pub format: Option<String>,
    /// Whether to use colors in output.
    pub color: bool,
    /// Whether to pretty-print JSON output.
    pub pretty: bool,
    /// Artifact output directory.
    pub artifact_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
            pretty: false,
            artifact_dir: None,
        }
    }
}

/// One provider: where to call, how, with which targets and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Base URL; the style's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub style: RequestStyle,
    /// Targets in preference order.
    #[serde(default)]
    pub targets: Vec<String>,
    pub credentials: CredentialSource,
    /// Request parameters merged over the style's defaults.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`GenpoolError::ConfigParse`] if the file is not valid TOML
    /// for this schema.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| GenpoolError::ConfigParse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GenpoolError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        if let Some(format) = &self.output.format {
            if !["human", "json", "md"].contains(&format.as_str()) {
                return Err(GenpoolError::ConfigInvalid {
                    key: "output.format".to_string(),
                    value: format.clone(),
                    message: "valid formats: human, json, md".to_string(),
                });
            }
        }

        check_cooldown(self.general.effective_cooldown())?;
        check_max_attempts(self.general.max_attempts)?;
        check_timeout(self.general.timeout_seconds)?;
        self.general.scheduling_mode()?;

        if self.general.fan_out == 0 {
            return Err(GenpoolError::ConfigInvalid {
                key: "fan_out".to_string(),
                value: "0".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(GenpoolError::ConfigInvalid {
                    key: "providers.name".to_string(),
                    value: provider.name.clone(),
                    message: "provider name must not be empty".to_string(),
                });
            }
            if !names.insert(provider.name.as_str()) {
                return Err(GenpoolError::ConfigInvalid {
                    key: "providers.name".to_string(),
                    value: provider.name.clone(),
                    message: "duplicate provider name".to_string(),
                });
            }
            if provider.targets.is_empty() {
                return Err(GenpoolError::NoTargets(provider.name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::cli::args::Commands;
    use crate::test_utils::{TestDir, make_test_config_toml};

    fn make_test_cli() -> Cli {
        Cli {
            command: Commands::Keys(crate::cli::args::KeysArgs::default()),
            format: OutputFormat::Human,
            json: false,
            pretty: false,
            no_color: false,
            log_level: None,
            json_output: false,
            verbose: false,
            config: None,
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn sample_config() -> Config {
        let dir = TestDir::new();
        toml::from_str(&make_test_config_toml(dir.path(), "http://127.0.0.1:9")).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.general.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
    }

    #[test]
    fn sample_config_parses_providers() {
        let config = sample_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers.len(), 2);

        let gemini = &config.providers[0];
        assert_eq!(gemini.style, RequestStyle::KeyInQuery);
        assert_eq!(gemini.targets.len(), 2);
        assert!(matches!(gemini.credentials, CredentialSource::Directory { .. }));

        let deepinfra = &config.providers[1];
        assert_eq!(deepinfra.style, RequestStyle::BearerJson);
        assert_eq!(
            deepinfra.credentials,
            CredentialSource::Env {
                var: "GENPOOL_TEST_DEEPINFRA_KEY".to_string()
            }
        );
    }

    #[test]
    fn text_and_speech_styles_parse() {
        let config: Config = toml::from_str(
            r#"
[[providers]]
name = "gemini-text"
style = "generate_content"
targets = ["gemini-2.0-flash", "gemini-1.5-pro"]
credentials = { type = "inline", keys = ["k-000000000001"] }

[[providers]]
name = "voice"
style = "elevenlabs"
targets = ["21m00Tcm4TlvDq8ikWAM"]
credentials = { type = "env", var = "ELEVENLABS_API_KEY" }
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.providers[0].style, RequestStyle::GenerateContent);
        assert_eq!(config.providers[1].style, RequestStyle::ElevenLabs);
    }

    #[test]
    fn provider_parameters_are_free_form() {
        let config: Config = toml::from_str(
            r#"
[[providers]]
name = "p"
targets = ["t"]
credentials = { type = "inline", keys = ["k-000000000001"] }
parameters = { sampleCount = 2, personGeneration = "dont_allow" }
"#,
        )
        .unwrap();
        let params = &config.providers[0].parameters;
        assert_eq!(params["sampleCount"], Value::from(2));
        assert_eq!(params["personGeneration"], Value::from("dont_allow"));
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let dir = TestDir::new();
        dir.create_file("config.toml", "this is not valid toml {{{{");
        let err = Config::load_from(&dir.file_path("config.toml")).unwrap_err();
        assert_eq!(err.error_code(), "GENPOOL-C001");
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = TestDir::new();
        let path = dir.path().join("nested/config.toml");
        let mut config = sample_config();
        config.general.max_attempts = 7;

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.general.max_attempts, 7);
        assert_eq!(loaded.providers.len(), 2);
        assert_eq!(loaded.providers[1].name, "deepinfra");
    }

    #[test]
    fn validate_rejects_provider_without_targets() {
        let mut config = sample_config();
        config.providers[0].targets.clear();
        assert!(matches!(config.validate(), Err(GenpoolError::NoTargets(name)) if name == "gemini"));
    }

    #[test]
    fn validate_rejects_duplicate_provider_names() {
        let mut config = sample_config();
        config.providers[1].name = "gemini".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("providers.name"));
    }

    #[test]
    fn validate_bounds() {
        let mut config = Config::default();
        config.general.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.cooldown_seconds = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.scheduling = "chaotic".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output.format = Some("yaml".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config: Config = toml::from_str(
            r#"
[general]
max_attempts = 30
future_field = "some_value"

[unknown_section]
foo = "bar"
"#,
        )
        .unwrap();
        assert_eq!(config.general.max_attempts, 30);
    }

    // -------------------------------------------------------------------------
    // ResolvedConfig tests
    // -------------------------------------------------------------------------

    #[test]
    fn config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI flag");
        assert_eq!(ConfigSource::Env.to_string(), "environment variable");
        assert_eq!(ConfigSource::ConfigFile.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    #[test]
    fn resolved_defaults() {
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &Config::default(), &no_env)
                .unwrap();
        assert_eq!(resolved.format, OutputFormat::Human);
        assert_eq!(resolved.cooldown, DEFAULT_COOLDOWN);
        assert_eq!(resolved.sources.cooldown, ConfigSource::Default);
        assert_eq!(resolved.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(resolved.scheduling, SchedulingMode::Sequential);
        assert_eq!(resolved.max_parallel_units, 1);
        assert!(resolved.primary.is_none());
        assert!(!resolved.no_color);
    }

    #[test]
    fn file_values_apply_and_first_provider_is_primary() {
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &sample_config(), &no_env)
                .unwrap();
        assert_eq!(resolved.cooldown, Duration::from_secs(1));
        assert_eq!(resolved.sources.cooldown, ConfigSource::ConfigFile);
        assert_eq!(resolved.max_attempts, 20);
        assert_eq!(resolved.timeout, Duration::from_secs(5));
        assert!(resolved.no_color);
        assert_eq!(resolved.sources.no_color, ConfigSource::ConfigFile);
        assert_eq!(resolved.primary.as_deref(), Some("gemini"));
        assert!(resolved.provider("deepinfra").is_some());
    }

    #[test]
    fn env_overrides_file() {
        let env = env_from(&[
            (ENV_COOLDOWN, "0.25"),
            (ENV_MAX_ATTEMPTS, "9"),
            (ENV_TIMEOUT, "30"),
            (ENV_FORMAT, "md"),
            (ENV_ARTIFACT_DIR, "/tmp/genpool-out"),
        ]);
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &sample_config(), &env).unwrap();
        assert_eq!(resolved.cooldown, Duration::from_millis(250));
        assert_eq!(resolved.max_attempts, 9);
        assert_eq!(resolved.timeout, Duration::from_secs(30));
        assert_eq!(resolved.format, OutputFormat::Md);
        assert_eq!(resolved.artifact_dir, PathBuf::from("/tmp/genpool-out"));
        assert_eq!(resolved.sources.max_attempts, ConfigSource::Env);
        assert_eq!(resolved.sources.artifact_dir, ConfigSource::Env);
    }

    #[test]
    fn cli_overrides_env() {
        let env = env_from(&[(ENV_MAX_ATTEMPTS, "9"), (ENV_ARTIFACT_DIR, "/tmp/env")]);
        let run = RunArgs {
            batch: PathBuf::from("b.json"),
            provider: Some("deepinfra".to_string()),
            racing: true,
            fan_out: Some(3),
            parallel: Some(4),
            out: Some(PathBuf::from("/tmp/cli")),
            max_attempts: Some(2),
            ..RunArgs::default()
        };
        let mut cli = make_test_cli();
        cli.json = true;

        let resolved = ResolvedConfig::resolve_with(&cli, Some(&run), &sample_config(), &env).unwrap();
        assert_eq!(resolved.format, OutputFormat::Json);
        assert_eq!(resolved.max_attempts, 2);
        assert_eq!(resolved.sources.max_attempts, ConfigSource::Cli);
        assert_eq!(resolved.artifact_dir, PathBuf::from("/tmp/cli"));
        assert_eq!(resolved.scheduling, SchedulingMode::Racing { fan_out: 3 });
        assert_eq!(resolved.max_parallel_units, 4);
        assert_eq!(resolved.primary.as_deref(), Some("deepinfra"));
    }

    #[test]
    fn invalid_env_number_is_config_error() {
        let env = env_from(&[(ENV_MAX_ATTEMPTS, "lots")]);
        let err = ResolvedConfig::resolve_with(&make_test_cli(), None, &Config::default(), &env)
            .unwrap_err();
        assert_eq!(err.error_code(), "GENPOOL-C002");
    }

    #[test]
    fn no_color_from_standard_env() {
        let env = env_from(&[(ENV_NO_COLOR_STD, "")]);
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &Config::default(), &env).unwrap();
        assert!(resolved.no_color);
        assert_eq!(resolved.sources.no_color, ConfigSource::Env);
    }

    #[test]
    fn racing_from_config_file() {
        let mut config = Config::default();
        config.general.scheduling = "racing".to_string();
        config.general.fan_out = 2;
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &config, &no_env).unwrap();
        assert_eq!(resolved.scheduling, SchedulingMode::Racing { fan_out: 2 });
        assert_eq!(resolved.batch_options().mode, resolved.scheduling);
    }

    #[test]
    fn option_builders_carry_resolved_values() {
        let resolved =
            ResolvedConfig::resolve_with(&make_test_cli(), None, &sample_config(), &no_env)
                .unwrap();
        assert_eq!(resolved.pool_options().cooldown, Duration::from_secs(1));
        assert_eq!(resolved.orchestrator_options().max_attempts, 20);
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(Some(v)), "{v} should be truthy");
        }
        for v in ["0", "false", "no", ""] {
            assert!(!is_truthy(Some(v)), "{v} should not be truthy");
        }
        assert!(!is_truthy(None));
    }
}
