//! Store location for the CLI.
//!
//! Resolution order: `--url`, then `EKV_URL`, then `[store] url` in the
//! `--config` file, then the default local store.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use ekv_client::{ClientConfig, DEFAULT_URL};

/// On-disk configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    pub url: Option<String>,
}

impl FileConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Picks the store URL. `url` already carries `EKV_URL` when the flag is absent.
pub fn resolve(url: Option<&str>, config_path: Option<&Path>) -> Result<ClientConfig> {
    let from_file = match config_path {
        Some(path) => FileConfig::load_from(path)?.store.url,
        None => None,
    };
    let chosen = url.map(str::to_string).or(from_file);
    let raw = chosen.as_deref().unwrap_or(DEFAULT_URL);
    tracing::debug!(url = %raw, "resolved store url");
    Ok(ClientConfig::from_url(raw)?)
}
