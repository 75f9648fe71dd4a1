use std::path::{Path, PathBuf};

use anyhow::Context;
use depot_blob::FsBlobStoreConfig;
use depot_data::{CsvOptions, JsonOptions};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "depot.toml";

/// Contents of `depot.toml`. Every section is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    pub store: FsBlobStoreConfig,
    pub json: JsonOptions,
    pub csv: CsvOptions,
}

impl DepotConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `depot.toml` is read if
    /// present and defaults are used otherwise.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE}; using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root {
            self.store.root = root;
        }
        self
    }
}
