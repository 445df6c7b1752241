//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Generation pool - run work units across pooled credentials and providers.
#[derive(Parser, Debug)]
#[command(name = "genpool")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (overrides GENPOOL_CONFIG)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch of work units
    Run(RunArgs),

    /// List loaded credentials per provider (masked)
    Keys(KeysArgs),

    /// Classify a raw error signal
    Classify(ClassifyArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Batch file (JSON array of work units, or {"units": [...]})
    #[arg(long, short = 'b', value_name = "FILE")]
    pub batch: PathBuf,

    /// Primary provider (defaults to the first configured provider)
    #[arg(long, value_name = "NAME")]
    pub provider: Option<String>,

    /// Race several credentials per unit instead of trying them in turn
    #[arg(long)]
    pub racing: bool,

    /// Concurrent credentials per unit in racing mode
    #[arg(long, value_name = "N", requires = "racing")]
    pub fan_out: Option<usize>,

    /// Work units in progress at once
    #[arg(long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Artifact output directory
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Ceiling on credential selections per unit
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<usize>,

    /// Cooldown after a rate limit, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub cooldown: Option<f64>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Sleep through cooldowns instead of giving up on a unit
    #[arg(long)]
    pub wait_on_cooldown: bool,
}

/// Arguments for the `keys` command.
#[derive(Parser, Debug, Default)]
pub struct KeysArgs {
    /// Only list this provider
    #[arg(long, value_name = "NAME")]
    pub provider: Option<String>,
}

/// Arguments for the `classify` command.
#[derive(Parser, Debug, Default)]
pub struct ClassifyArgs {
    /// HTTP status code
    #[arg(long, value_name = "CODE")]
    pub status: Option<u16>,

    /// Error message text
    #[arg(long, value_name = "TEXT")]
    pub message: Option<String>,
}

impl ClassifyArgs {
    /// Require at least one of `--status` or `--message`.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.status.is_none() && self.message.is_none() {
            return Err(crate::error::GenpoolError::Config(
                "classify needs --status, --message, or both".to_string(),
            ));
        }
        Ok(())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Md,
}
