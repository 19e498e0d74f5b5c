//! Host configuration loading.

use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the configured token, so deployments
/// keep credentials out of config files.
pub const TOKEN_ENV_VAR: &str = "TAXON_HOST_TOKEN";

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Connection settings for the hosted repository.
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    pub owner: String,
    pub repo: String,
    /// Branch accumulating taxonomy commits before review.
    pub working_branch: String,
    /// Branch pull requests target.
    pub review_branch: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no code-host token configured (set {TOKEN_ENV_VAR} or the `token` key)")]
    MissingToken,
}

impl HostConfig {
    /// Parse from TOML text, applying the env token override.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: HostConfig = toml::from_str(text)?;
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            config.token = token;
        }
        if config.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(config)
    }

    /// Load from a TOML file on disk.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// `owner/repo` as the host's API expects it.
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}
