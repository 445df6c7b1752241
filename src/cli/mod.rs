//! CLI argument parsing and command dispatch.

pub mod args;
pub mod classify;
pub mod keys;
pub mod run;

pub use args::{Cli, Commands, OutputFormat};

use crate::error::Result;
use crate::storage::ResolvedConfig;

/// Display settings after config resolution.
#[derive(Debug, Clone, Copy)]
pub struct Display {
    pub format: OutputFormat,
    pub pretty: bool,
    pub no_color: bool,
}

impl Display {
    /// Display settings from CLI flags only, for output produced before the
    /// config is loaded.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.effective_format(),
            pretty: cli.pretty,
            no_color: !crate::util::env::should_use_color(cli.no_color),
        }
    }

    #[must_use]
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            format: config.format,
            pretty: config.pretty,
            no_color: !crate::util::env::should_use_color(config.no_color),
        }
    }
}

/// Execute the parsed command line.
///
/// # Errors
///
/// Returns the command's error; the caller renders it and maps the exit code.
pub async fn execute(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let config = ResolvedConfig::resolve(cli, Some(args))?;
            run::execute(args, &config, Display::from_config(&config)).await
        }
        Commands::Keys(args) => {
            let config = ResolvedConfig::resolve(cli, None)?;
            keys::execute(args, &config, Display::from_config(&config))
        }
        Commands::Classify(args) => classify::execute(args, Display::from_cli(cli)),
    }
}
