//! Persisted client configuration (`~/.cip/config.json`).

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::CIP_VERSION;
use crate::error::CipError;
use crate::runtime::Runtime;

pub const DEFAULT_REGISTRY_URL: &str = "https://cip.zhiyuhub.top";

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CipConfig {
    pub registry_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_target: Option<PathBuf>,
    /// Tool version that last wrote this file.
    #[serde(default)]
    pub version: String,
}

impl Default for CipConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            install_target: None,
            version: CIP_VERSION.to_string(),
        }
    }
}

/// Settable configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    RegistryUrl,
    InstallTarget,
}

impl FromStr for ConfigKey {
    type Err = CipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "web_url" is the key older config files used
            "registry_url" | "web_url" => Ok(ConfigKey::RegistryUrl),
            "install_target" => Ok(ConfigKey::InstallTarget),
            other => Err(CipError::UnknownConfigKey(other.to_string())),
        }
    }
}

impl CipConfig {
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::RegistryUrl => Some(self.registry_url.clone()),
            ConfigKey::InstallTarget => self
                .install_target
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }

    pub fn set(&mut self, key: ConfigKey, value: &str) {
        match key {
            ConfigKey::RegistryUrl => self.registry_url = value.trim_end_matches('/').to_string(),
            ConfigKey::InstallTarget => self.install_target = Some(PathBuf::from(value)),
        }
    }
}

/// Loads and saves [`CipConfig`] in a configuration directory.
pub struct ConfigStore<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> ConfigStore<'a, R> {
    /// Store in `dir`, or in `~/.cip` when no directory is given.
    pub fn new(runtime: &'a R, dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => runtime
                .home_dir()
                .ok_or_else(|| anyhow!("Cannot determine home directory"))?
                .join(".cip"),
        };
        Ok(Self {
            runtime,
            path: dir.join(CONFIG_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, writing the defaults on first use.
    ///
    /// A file written by a different tool version is rewritten with the
    /// current version after a warning.
    #[tracing::instrument(skip(self))]
    pub fn load_or_init(&self) -> Result<CipConfig> {
        if !self.runtime.exists(&self.path) {
            debug!("No config at {:?}, writing defaults", self.path);
            let config = CipConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = self.runtime.read_to_string(&self.path)?;
        let mut config: CipConfig = serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse {:?}. Run `cip reset` to regenerate it.",
                self.path
            )
        })?;

        if config.version != CIP_VERSION {
            warn!(
                "Config file was written by cip {}, updating it for cip {}",
                config.version, CIP_VERSION
            );
            config.version = CIP_VERSION.to_string();
            self.save(&config)?;
        }

        Ok(config)
    }

    #[tracing::instrument(skip(self, config))]
    pub fn save(&self, config: &CipConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(config)?;
        self.runtime.write(&self.path, json.as_bytes())
    }

    /// Replaces the configuration with the defaults.
    pub fn reset(&self) -> Result<CipConfig> {
        if self.runtime.exists(&self.path) {
            self.runtime.remove_file(&self.path)?;
        }
        self.load_or_init()
    }
}
