//! Reads and parses the daemon config from a TOML file.

use std::path::Path;

use crate::error::ConfigError;

use super::DaemonConfig;

/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read and
/// [`ConfigError::Parse`] if its contents aren't valid TOML for
/// [`DaemonConfig`].
pub async fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source: Box::new(source),
    })
}
