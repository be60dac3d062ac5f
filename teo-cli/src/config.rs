//! Host settings for teogo
//!
//! These are settings of the host shell, not of the node: the node reads its
//! own options from the command line and its configuration file. The host
//! file only decides how the node is advertised and how the host logs.

use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use serde_json::{from_str, to_string_pretty};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use teo_host::InitFlags;

/// Environment variable naming the host settings file
pub const CONFIG_ENV: &str = "TEO_HOST_CONFIG";

pub const DEFAULT_APPLICATION_TYPE: &str = "teo-go";
pub const DEFAULT_APPLICATION_VERSION: &str = "0.0.1";

/// Settings stored in the host configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Application type advertised to peers
    pub application_type: String,

    /// Application version advertised to peers
    pub application_version: String,

    /// Let the runtime read its own configuration file as well as argv
    pub read_configuration: bool,

    /// Host log level when RUST_LOG is not set (`error` ... `trace`)
    pub log_level: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            application_type: DEFAULT_APPLICATION_TYPE.to_string(),
            application_version: DEFAULT_APPLICATION_VERSION.to_string(),
            read_configuration: true,
            log_level: None,
        }
    }
}

impl HostConfig {
    /// Load settings from `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Host configuration file not found: {path:?}"));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read host config file: {path:?}"))?;

        let config: HostConfig = from_str(&content)
            .with_context(|| format!("Failed to parse host config file: {path:?}"))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit`, else from `TEO_HOST_CONFIG`, else use defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match Self::resolve_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save settings to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = to_string_pretty(self).context("Failed to serialize host config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write host config file: {path:?}"))?;

        Ok(())
    }

    /// Which configuration sources the runtime should read
    pub fn init_flags(&self) -> InitFlags {
        if self.read_configuration {
            InitFlags::READ_ALL
        } else {
            InitFlags::READ_OPTIONS
        }
    }

    /// Parsed `log_level`, if any
    pub fn level_filter(&self) -> Result<Option<LevelFilter>> {
        self.log_level
            .as_deref()
            .map(|level| {
                LevelFilter::from_str(level)
                    .map_err(|_| anyhow!("Invalid log level in host config: {level:?}"))
            })
            .transpose()
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var_os(CONFIG_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }

    fn validate(&self) -> Result<()> {
        if self.application_type.is_empty() {
            return Err(anyhow!("application_type must not be empty"));
        }
        for (field, value) in [
            ("application_type", &self.application_type),
            ("application_version", &self.application_version),
        ] {
            if value.contains('\0') {
                return Err(anyhow!("{field} must not contain NUL bytes"));
            }
        }
        self.level_filter()?;
        Ok(())
    }
}
