//! Keys command implementation.

use super::Display;
use crate::cli::args::KeysArgs;
use crate::core::models::ProviderKeys;
use crate::error::{GenpoolError, Result};
use crate::render;
use crate::storage::{ProviderConfig, ResolvedConfig};

/// Load every selected provider's credentials without failing on a bad
/// source; failures are reported per provider.
///
/// # Errors
///
/// Returns [`GenpoolError::UnknownProvider`] if `--provider` names a provider
/// that is not configured.
pub fn collect(args: &KeysArgs, config: &ResolvedConfig) -> Result<Vec<ProviderKeys>> {
    let selected: Vec<&ProviderConfig> = match &args.provider {
        Some(name) => vec![
            config
                .provider(name)
                .ok_or_else(|| GenpoolError::UnknownProvider(name.clone()))?,
        ],
        None => config.providers.iter().collect(),
    };

    Ok(selected
        .into_iter()
        .map(|provider| {
            let source = provider.credentials.describe();
            match provider.credentials.load(&provider.name) {
                Ok(credentials) => ProviderKeys::loaded(
                    &provider.name,
                    source,
                    provider.targets.clone(),
                    &credentials,
                ),
                Err(err) => {
                    tracing::warn!(provider = %provider.name, error = %err, "Credential source failed");
                    ProviderKeys::failed(&provider.name, source, provider.targets.clone(), err.to_string())
                }
            }
        })
        .collect())
}

/// Execute the keys command.
///
/// # Errors
///
/// Returns an error for an unknown `--provider` or a rendering failure.
pub fn execute(args: &KeysArgs, config: &ResolvedConfig, display: Display) -> Result<()> {
    let keys = collect(args, config)?;
    let output = render::render_keys(&keys, display.format, display.pretty, display.no_color)?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
