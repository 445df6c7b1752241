//! Application paths for config and generated artifacts.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Data directory; default parent of the artifact directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the genpool application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("dev", "genpool", "genpool") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/genpool"),
                data: home.join(".local/share/genpool"),
            }
        }
    }

    /// Path to the main config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default directory for credential files of a provider.
    #[must_use]
    pub fn credentials_dir(&self, provider: &str) -> PathBuf {
        self.config.join("credentials").join(provider)
    }

    /// Default artifact output directory.
    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.data.join("artifacts")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}
