//! Engine configuration (domweave.yml)

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::template::{AssetRecord, Value};

/// Default configuration file name
pub const CONFIG_FILE: &str = "domweave.yml";

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Template root; relative paths resolve against the config file's directory
    pub template_dir: PathBuf,
    /// Prefix for injected asset URLs
    pub base_uri: String,
    /// Stylesheets and scripts injected on every render
    pub assets: Vec<AssetRecord>,
    /// Variables assigned before any data model
    pub variables: IndexMap<String, serde_yaml::Value>,
    /// HTML-escape placeholder values
    pub escape_placeholders: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            base_uri: "/".to_string(),
            assets: Vec::new(),
            variables: IndexMap::new(),
            escape_placeholders: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let mut config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;

        if config.template_dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.template_dir = base.join(&config.template_dir);
        }
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load `domweave.yml` from `dir`, or defaults rooted at `dir` when absent
    pub fn load_or_default<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Self::load(&config_path);
        }

        let mut config = Self::default();
        config.template_dir = dir.join(&config.template_dir);
        Ok(config)
    }

    /// Configured variables as template values
    pub fn seed_variables(&self) -> IndexMap<String, Value> {
        self.variables
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
            .collect()
    }
}
