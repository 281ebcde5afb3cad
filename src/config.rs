//! Application configuration
//!
//! Loads `AppConfig` from YAML, then applies environment overrides.
//!
//! Path resolution order:
//! 1. `LICENSE_COMPLIANCE_CONFIG` (explicit override)
//! 2. `config/license-compliance.yaml` relative to the working directory
//! 3. Built-in defaults (empty catalog)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use compliance_core::{LicenseCatalog, StaticCoreFactorTable, UsagePolicy};
use compliance_types::LicensePart;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const CONFIG_ENV: &str = "LICENSE_COMPLIANCE_CONFIG";
pub const DATABASE_URL_ENV: &str = "LICENSE_COMPLIANCE_DATABASE_URL";
pub const LOG_ENV: &str = "LICENSE_COMPLIANCE_LOG";
pub const DEFAULT_CONFIG_PATH: &str = "config/license-compliance.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub version: String,
    pub parts: Vec<LicensePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub core_factors: StaticCoreFactorTable,
    pub usage: UsagePolicy,
    pub database: DatabaseConfig,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            core_factors: StaticCoreFactorTable::default(),
            usage: UsagePolicy::default(),
            database: DatabaseConfig::default(),
            log_filter: "info".into(),
        }
    }
}

impl AppConfig {
    /// Load from a YAML file without environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(
            path = %path.display(),
            parts = config.catalog.parts.len(),
            core_factor_version = %config.core_factors.version,
            "loaded configuration"
        );
        Ok(config)
    }

    /// Resolve the config file (see module docs), load it and apply
    /// environment overrides. Reads `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match Self::resolve_path(lookup) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Load an explicit file, still honouring environment overrides.
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::load(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn resolve_path(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(path) = lookup(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        default.exists().then(|| default.to_path_buf())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.database.url = Some(url);
        }
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = filter;
        }
    }

    pub fn catalog(&self) -> Result<LicenseCatalog> {
        LicenseCatalog::new(&self.catalog.version, self.catalog.parts.clone())
            .context("Invalid license catalog")
    }
}
