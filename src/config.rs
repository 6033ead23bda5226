use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::policy::DuplicatePolicy;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            database: PathBuf::from("antenna.db"),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// Load the config file, falling back to defaults when there is none.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).context("Failed to read config")?;
    let config = toml::from_str(&data).context("Failed to parse config")?;
    Ok(config)
}
