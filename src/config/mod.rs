//! Configuration for varhydrate.
//!
//! Settings live in a single TOML file:
//!
//! - Unix/macOS: `~/.varhydrate/config.toml`
//! - Windows: `%LOCALAPPDATA%\varhydrate\config.toml`
//!
//! The location can be overridden with the `VARHYDRATE_CONFIG_PATH` environment
//! variable or the `--config` CLI flag. A missing file yields the defaults.
//!
//! ```toml
//! org_id = "my-org"
//! query_url = "http://localhost:8086/api/v2/query"
//! reference_syntax = "flux"
//! strict_cycles = false
//! log_level = "info"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::graph::ReferenceSyntax;
use crate::hydrate::HydrationOptions;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "VARHYDRATE_CONFIG_PATH";

/// Organization used when none is configured.
pub const DEFAULT_ORG_ID: &str = "default";

/// Query endpoint used when none is configured.
pub const DEFAULT_QUERY_URL: &str = "http://localhost:8086/api/v2/query";

fn default_org_id() -> String {
    DEFAULT_ORG_ID.to_string()
}

fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}

/// Settings shared by every hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrateConfig {
    /// Organization variables belong to
    #[serde(default = "default_org_id")]
    pub org_id: String,

    /// Query endpoint handed to executors
    #[serde(default = "default_query_url")]
    pub query_url: String,

    /// Placeholder syntax of query templates
    #[serde(default)]
    pub reference_syntax: ReferenceSyntax,

    /// Fail hydration on a reference cycle instead of skipping the cyclic variables.
    #[serde(default)]
    pub strict_cycles: bool,

    /// Log filter used when neither `RUST_LOG` nor a verbosity flag is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for HydrateConfig {
    fn default() -> Self {
        Self {
            org_id: default_org_id(),
            query_url: default_query_url(),
            reference_syntax: ReferenceSyntax::default(),
            strict_cycles: false,
            log_level: None,
        }
    }
}

impl HydrateConfig {
    /// Load from the default location, or defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the default path cannot be determined, or the file exists but
    /// cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path` if given, otherwise from the default location.
    ///
    /// An explicit path that doesn't exist is an error; a missing default file is not.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(&path).await,
            None => Self::load().await,
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Write the configuration as pretty TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Platform default config path, honoring `VARHYDRATE_CONFIG_PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("varhydrate")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".varhydrate")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Options for the hydration scheduler.
    #[must_use]
    pub fn hydration_options(&self) -> HydrationOptions {
        HydrationOptions {
            org_id: self.org_id.clone(),
            query_url: self.query_url.clone(),
            syntax: self.reference_syntax,
            strict_cycles: self.strict_cycles,
        }
    }
}
