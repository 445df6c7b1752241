//! Storage for configuration, credential sources, and artifacts.

pub mod artifacts;
pub mod config;
pub mod credentials;
pub mod paths;

pub use artifacts::ArtifactSink;
pub use config::{
    Config, ConfigSource, ConfigSources, ENV_ARTIFACT_DIR, ENV_CONFIG, ENV_COOLDOWN, ENV_FORMAT,
    ENV_MAX_ATTEMPTS, ENV_NO_COLOR, ENV_NO_COLOR_STD, ENV_PRETTY, ENV_TIMEOUT, GeneralConfig,
    OutputConfig, ProviderConfig, ResolvedConfig,
};
pub use credentials::CredentialSource;
pub use paths::AppPaths;
