//! genpool - credential-pool failover and multi-provider generation
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use genpool::cli::{self, Cli, Display};
use genpool::core::logging::{self, LogSettings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(&LogSettings::from_env(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
    ));
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting genpool");

    match cli::execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            let display = Display::from_cli(&cli);
            let error_output = genpool::render::error::render_error_full(
                &e,
                display.format,
                display.no_color,
                display.pretty,
            );
            eprintln!("{error_output}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
